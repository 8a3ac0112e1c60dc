//! Regulatory analyses for audits under a SEBI-enabled framework: filing
//! accuracy, timeliness against disclosure SLAs, a weighted risk score,
//! behavioural patterns, evidence packs and a combined dashboard.
//!
//! Every report is gated on activation. Sub-analyses that call the model
//! degrade to `analysis_failed` instead of failing the report.

pub mod accuracy;
pub mod dashboard;
pub mod evidence_pack;
pub mod patterns;
pub mod risk;
pub mod signals;
pub mod timeliness;

use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use crate::db::Database;
use crate::errors::AttestError;
use crate::evaluation::EvaluationEngine;
use crate::extract::TextExtractor;
use crate::llm::{CallTags, LlmClient, ModelType};
use crate::models::{Audit, Framework};
use crate::prompts::{PromptLoader, PromptVariables};
use crate::utils::truncation::truncate_error;

pub use evidence_pack::UseCase;
pub use signals::ExternalSignals;

/// Comments that record a correction to an earlier disclosure.
pub(crate) static CORRECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(correct(ion|ions|ed)|amend(ment|ments|ed)|revis(ed|ion|ions))\b").unwrap()
});

/// Result of one model-assisted check.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Check<T> {
    Done(T),
    Failed { status: &'static str, error: String },
}

impl<T> Check<T> {
    pub fn failed(err: &AttestError) -> Self {
        Self::Failed { status: "analysis_failed", error: truncate_error(&err.to_string()) }
    }

    pub fn done(&self) -> Option<&T> {
        match self {
            Self::Done(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Either the report or the fixed `{enabled: false}` answer.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SebiResponse<T> {
    Disabled {
        enabled: bool,
        framework_id: i64,
        message: String,
    },
    Enabled {
        enabled: bool,
        #[serde(flatten)]
        report: T,
    },
}

impl<T> SebiResponse<T> {
    fn disabled(framework_id: i64) -> Self {
        Self::Disabled {
            enabled: false,
            framework_id,
            message: "SEBI auditor is not enabled for this framework".to_string(),
        }
    }

    fn enabled(report: T) -> Self {
        Self::Enabled { enabled: true, report }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    pub fn report(&self) -> Option<&T> {
        match self {
            Self::Enabled { report, .. } => Some(report),
            Self::Disabled { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableResult {
    pub framework_id: i64,
    pub framework_name: String,
    pub enabled: bool,
}

/// Audit plus its framework, resolved once per report.
pub(crate) struct SebiScope {
    pub audit: Audit,
    pub framework: Framework,
}

#[derive(Clone)]
pub struct SebiAuditor {
    db: Database,
    llm: LlmClient,
    prompts: PromptLoader,
    extractor: TextExtractor,
    signals: ExternalSignals,
}

impl SebiAuditor {
    pub fn new(db: Database, llm: LlmClient, prompts: PromptLoader, extractor: TextExtractor) -> Self {
        Self { db, llm, prompts, extractor, signals: ExternalSignals::default() }
    }

    /// Share the engine's database, model client, prompts and extractor.
    pub fn from_engine(engine: &EvaluationEngine) -> Self {
        let analyzer = engine.analyzer();
        Self::new(
            engine.db().clone(),
            analyzer.llm().clone(),
            analyzer.prompts().loader().clone(),
            engine.extractor().clone(),
        )
    }

    pub fn with_signals(mut self, signals: ExternalSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Active when the framework flag is set or any of its compliances carries one.
    pub fn is_enabled(&self, tenant_id: i64, framework: &Framework) -> Result<bool, AttestError> {
        if framework.sebi_ai_enabled {
            return Ok(true);
        }
        self.db.framework_has_sebi_compliance(tenant_id, framework.id)
    }

    pub fn enable(&self, tenant_id: i64, framework_id: i64) -> Result<EnableResult, AttestError> {
        let framework = self
            .db
            .get_framework(tenant_id, framework_id)?
            .ok_or_else(|| AttestError::NotFound(format!("framework {}", framework_id)))?;
        self.db.set_framework_sebi_enabled(tenant_id, framework_id, true)?;
        info!(tenant_id, framework_id, "SEBI auditor enabled");
        Ok(EnableResult { framework_id, framework_name: framework.name, enabled: true })
    }

    /// Resolve the audit and its framework. `Ok(Err(framework_id))` means SEBI mode is off.
    pub(crate) fn scope(&self, tenant_id: i64, audit_id: i64) -> Result<Result<SebiScope, i64>, AttestError> {
        let audit = self.db.require_audit(tenant_id, audit_id)?;
        let framework = self
            .db
            .get_framework(tenant_id, audit.framework_id)?
            .ok_or_else(|| AttestError::NotFound(format!("framework {}", audit.framework_id)))?;
        if !self.is_enabled(tenant_id, &framework)? {
            info!(tenant_id, audit_id, framework_id = framework.id, "SEBI auditor disabled for framework");
            return Ok(Err(framework.id));
        }
        Ok(Ok(SebiScope { audit, framework }))
    }

    /// Render a SEBI prompt and parse the JSON answer.
    pub(crate) async fn ask(&self, template: &str, vars: &PromptVariables, audit_id: i64) -> Result<Value, AttestError> {
        let prompt = self.prompts.render(template, vars)?;
        let tags = CallTags::new(ModelType::Analysis).audit(audit_id);
        self.llm.chat_json(&prompt, None, tags).await.inspect_err(|e| {
            warn!(audit_id, template, error = %e, "SEBI analysis call failed");
        })
    }

    pub async fn filing_accuracy(
        &self,
        tenant_id: i64,
        audit_id: i64,
        document_id: Option<i64>,
    ) -> Result<SebiResponse<accuracy::AccuracyReport>, AttestError> {
        Ok(match self.scope(tenant_id, audit_id)? {
            Ok(scope) => SebiResponse::enabled(accuracy::analyze(self, tenant_id, &scope, document_id).await?),
            Err(framework_id) => SebiResponse::disabled(framework_id),
        })
    }

    pub async fn timeliness(&self, tenant_id: i64, audit_id: i64) -> Result<SebiResponse<timeliness::TimelinessReport>, AttestError> {
        Ok(match self.scope(tenant_id, audit_id)? {
            Ok(scope) => SebiResponse::enabled(timeliness::analyze(self, tenant_id, &scope)?),
            Err(framework_id) => SebiResponse::disabled(framework_id),
        })
    }

    pub async fn risk_score(&self, tenant_id: i64, audit_id: i64) -> Result<SebiResponse<risk::RiskReport>, AttestError> {
        Ok(match self.scope(tenant_id, audit_id)? {
            Ok(scope) => SebiResponse::enabled(risk::analyze(self, tenant_id, &scope, &self.signals)?),
            Err(framework_id) => SebiResponse::disabled(framework_id),
        })
    }

    pub async fn patterns(&self, tenant_id: i64, audit_id: i64) -> Result<SebiResponse<patterns::PatternReport>, AttestError> {
        Ok(match self.scope(tenant_id, audit_id)? {
            Ok(scope) => SebiResponse::enabled(patterns::analyze(self, tenant_id, &scope, &self.signals).await?),
            Err(framework_id) => SebiResponse::disabled(framework_id),
        })
    }

    pub async fn evidence_pack(
        &self,
        tenant_id: i64,
        audit_id: i64,
        use_case: UseCase,
    ) -> Result<SebiResponse<evidence_pack::EvidencePack>, AttestError> {
        Ok(match self.scope(tenant_id, audit_id)? {
            Ok(scope) => SebiResponse::enabled(evidence_pack::build(self, tenant_id, &scope, use_case, &self.signals)?),
            Err(framework_id) => SebiResponse::disabled(framework_id),
        })
    }

    pub async fn dashboard(&self, tenant_id: i64, audit_id: i64) -> Result<SebiResponse<dashboard::Dashboard>, AttestError> {
        Ok(match self.scope(tenant_id, audit_id)? {
            Ok(scope) => SebiResponse::enabled(dashboard::build(self, tenant_id, &scope, &self.signals)?),
            Err(framework_id) => SebiResponse::disabled(framework_id),
        })
    }

    /// Named report as JSON, for the CLI and generic callers.
    pub async fn report_json(&self, tenant_id: i64, audit_id: i64, report: &str) -> Result<Value, AttestError> {
        let value = match report {
            "filing-accuracy" => serde_json::to_value(self.filing_accuracy(tenant_id, audit_id, None).await?)?,
            "timeliness-sla" => serde_json::to_value(self.timeliness(tenant_id, audit_id).await?)?,
            "risk-score" => serde_json::to_value(self.risk_score(tenant_id, audit_id).await?)?,
            "patterns" => serde_json::to_value(self.patterns(tenant_id, audit_id).await?)?,
            "evidence-pack" => serde_json::to_value(self.evidence_pack(tenant_id, audit_id, UseCase::SebiInspection).await?)?,
            "dashboard" => serde_json::to_value(self.dashboard(tenant_id, audit_id).await?)?,
            other => return Err(AttestError::InvalidInput(format!("unknown SEBI report: {}", other))),
        };
        Ok(value)
    }
}

/// Names accepted by `report_json`.
pub const REPORTS: &[&str] = &["filing-accuracy", "timeliness-sla", "risk-score", "patterns", "evidence-pack", "dashboard"];

pub(crate) fn placeholder(descriptor: &str) -> Value {
    json!({"status": "requires_external_data", "descriptor": descriptor})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correction_pattern() {
        assert!(CORRECTION_RE.is_match("Filing amended after exchange query"));
        assert!(CORRECTION_RE.is_match("Revised figures submitted"));
        assert!(CORRECTION_RE.is_match("CORRECTION issued for note 4"));
        assert!(!CORRECTION_RE.is_match("Filed on time with no remarks"));
    }

    #[test]
    fn test_disabled_response_shape() {
        let resp: SebiResponse<Value> = SebiResponse::disabled(3);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["enabled"], false);
        assert_eq!(v["framework_id"], 3);
    }

    #[test]
    fn test_enabled_response_flattens_report() {
        #[derive(Serialize)]
        struct R {
            score: u8,
        }
        let v = serde_json::to_value(SebiResponse::enabled(R { score: 7 })).unwrap();
        assert_eq!(v, json!({"enabled": true, "score": 7}));
    }

    #[test]
    fn test_failed_check_shape() {
        let c: Check<u8> = Check::failed(&AttestError::LLMUnavailable("timeout".into()));
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["status"], "analysis_failed");
        assert!(v["error"].as_str().unwrap().contains("timeout"));
    }
}
