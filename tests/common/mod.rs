#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use attest::config::EvaluationSettings;
use attest::db::Database;
use attest::errors::AttestError;
use attest::evaluation::EvaluationEngine;
use attest::extract::TextExtractor;
use attest::ingest::Ingestor;
use attest::llm::{LLMProvider, LLMResponse, LlmClient};
use attest::models::{EvidenceMapping, ExternalSource, NewAudit, NewCompliance, NewEvidence};
use attest::prompts::PromptBuilder;

pub const TENANT: i64 = 1;

type Responder = dyn Fn(&str) -> Result<String, AttestError> + Send + Sync;

/// Answers every prompt through a closure and records what it was asked.
pub struct ScriptedProvider {
    respond: Box<Responder>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(respond: impl Fn(&str) -> Result<String, AttestError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { respond: Box::new(respond), prompts: Mutex::new(Vec::new()) })
    }

    /// Batch prompts answered from a fixed verdict per requirement id.
    pub fn verdicts(table: HashMap<i64, Verdict>) -> Arc<Self> {
        Self::new(move |prompt| {
            let ids = listed_ids(prompt);
            Ok(batch_response(&ids.iter().filter_map(|id| table.get(id).map(|v| (*id, v.clone()))).collect::<Vec<_>>()))
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Requirements listed in each prompt, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.prompts.lock().unwrap().iter().map(|p| listed_ids(p).len()).collect()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<LLMResponse, AttestError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let content = (self.respond)(prompt)?;
        Ok(LLMResponse { content, input_tokens: None, output_tokens: None, model: "scripted".into() })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub status: &'static str,
    pub score: f64,
    pub risk: &'static str,
    pub confidence: f64,
    pub snippet: &'static str,
}

impl Verdict {
    pub fn new(status: &'static str, score: f64, risk: &'static str) -> Self {
        Self { status, score, risk, confidence: 0.8, snippet: "" }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn snippet(mut self, snippet: &'static str) -> Self {
        self.snippet = snippet;
        self
    }
}

pub fn listed_ids(prompt: &str) -> Vec<i64> {
    prompt
        .lines()
        .filter_map(|l| l.split("compliance_id: ").nth(1))
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

pub fn batch_response(entries: &[(i64, Verdict)]) -> String {
    let analyses: Vec<_> = entries
        .iter()
        .map(|(id, v)| {
            json!({
                "compliance_id": id,
                "compliance_status": v.status,
                "score": v.score,
                "risk_level": v.risk,
                "evidence_snippets": if v.snippet.is_empty() { vec![] } else { vec![v.snippet] },
                "strengths": [],
                "weaknesses": [],
                "missing": [],
                "recommendations": ["Keep the review cadence documented"],
                "confidence": v.confidence,
            })
        })
        .collect();
    json!({ "compliance_analyses": analyses }).to_string()
}

pub fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// In-memory database plus a media directory for evidence files.
pub struct Fixture {
    pub db: Database,
    pub media: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self { db: Database::in_memory().unwrap(), media: TempDir::new().unwrap() }
    }

    /// Framework with one policy and sub-policy holding `requirements`
    /// as (title, criticality, is_risk).
    pub fn framework(&self, name: &str, requirements: &[(&str, &str, bool)]) -> (i64, Vec<i64>) {
        let framework_id = self.db.insert_framework(TENANT, name, false).unwrap();
        let policy_id = self.db.insert_policy(TENANT, framework_id, &format!("{} policy", name)).unwrap();
        let sub_policy_id = self.db.insert_sub_policy(TENANT, policy_id, &format!("{} controls", name)).unwrap();
        let ids = requirements
            .iter()
            .map(|(title, criticality, is_risk)| {
                let mut c = NewCompliance::new(sub_policy_id, title, title);
                c.criticality = criticality.to_string();
                c.is_risk = *is_risk;
                self.db.insert_compliance(TENANT, &c).unwrap()
            })
            .collect();
        (framework_id, ids)
    }

    pub fn audit(&self, framework_id: i64, title: &str) -> i64 {
        self.db.insert_audit(TENANT, &NewAudit::new(framework_id, title, ymd(2025, 6, 30))).unwrap()
    }

    /// Write `text` into the media directory and register it against the audit.
    pub async fn document(&self, audit_id: i64, name: &str, text: &str, compliance_ids: &[i64]) -> i64 {
        std::fs::write(self.media.path().join(name), text).unwrap();
        let mappings = if compliance_ids.is_empty() {
            vec![EvidenceMapping::default()]
        } else {
            compliance_ids
                .iter()
                .map(|&id| EvidenceMapping { compliance_id: Some(id), ..Default::default() })
                .collect()
        };
        let evidence = NewEvidence {
            logical_name: name.to_string(),
            stored_path: name.to_string(),
            size: None,
            mime_type: Some("text/plain".into()),
            external_source: ExternalSource::Manual,
            external_id: None,
            mappings,
        };
        let outcome = Ingestor::new(self.db.clone(), self.media.path())
            .register(TENANT, audit_id, &evidence)
            .await
            .unwrap();
        outcome.document_ids[0]
    }

    pub fn settings(batch_size: usize) -> EvaluationSettings {
        EvaluationSettings { batch_size, enrich_findings: false, ..Default::default() }
    }

    pub fn llm(provider: Arc<ScriptedProvider>) -> LlmClient {
        LlmClient::new(provider, Duration::from_secs(5))
    }

    pub fn engine(&self, provider: Arc<ScriptedProvider>, batch_size: usize) -> EvaluationEngine {
        self.engine_with(provider, Self::settings(batch_size))
    }

    pub fn engine_with(&self, provider: Arc<ScriptedProvider>, settings: EvaluationSettings) -> EvaluationEngine {
        EvaluationEngine::new(
            self.db.clone(),
            Self::llm(provider),
            PromptBuilder::default(),
            TextExtractor::new(self.media.path(), &settings),
            &settings,
        )
    }
}
