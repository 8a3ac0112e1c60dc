use std::collections::VecDeque;
use tracing::{info, warn};
use crate::errors::AttestError;
use crate::llm::{CallTags, LlmClient, ModelType};
use crate::models::{ComplianceAnalysis, ComplianceRequirement};
use crate::prompts::{deterministic_seed, PromptBuilder};
use super::normalize::{parse_batch_response, ListLimits};

/// Identity of the document being analyzed, used for seeds and call tags.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisTarget<'a> {
    pub document_id: i64,
    pub audit_id: i64,
    pub document_name: &'a str,
}

/// Runs requirement batches against the model. A failed batch is split in
/// half until single requirements remain; a single requirement gets one
/// retry before it falls back to `requires_review`.
#[derive(Clone)]
pub struct BatchAnalyzer {
    llm: LlmClient,
    prompts: PromptBuilder,
    batch_size: usize,
    limits: ListLimits,
}

impl BatchAnalyzer {
    pub fn new(llm: LlmClient, prompts: PromptBuilder, batch_size: usize, limits: ListLimits) -> Self {
        Self { llm, prompts, batch_size: batch_size.max(1), limits }
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// One analysis per requirement, in requirement order.
    pub async fn analyze(
        &self,
        target: AnalysisTarget<'_>,
        text: &str,
        requirements: &[ComplianceRequirement],
    ) -> Vec<ComplianceAnalysis> {
        let mut analyses = Vec::with_capacity(requirements.len());
        for batch in requirements.chunks(self.batch_size) {
            analyses.extend(self.run_batch(target, text, batch).await);
        }
        let fallbacks = analyses.iter().filter(|a| a.is_fallback()).count();
        info!(
            document_id = target.document_id,
            audit_id = target.audit_id,
            requirements = requirements.len(),
            fallbacks,
            "Requirement analysis complete"
        );
        analyses
    }

    async fn run_batch(
        &self,
        target: AnalysisTarget<'_>,
        text: &str,
        batch: &[ComplianceRequirement],
    ) -> Vec<ComplianceAnalysis> {
        let mut results = Vec::with_capacity(batch.len());
        let mut pending: VecDeque<(&[ComplianceRequirement], bool)> = VecDeque::from([(batch, false)]);

        while let Some((chunk, retried)) = pending.pop_front() {
            let err = match self.call(target, text, chunk).await {
                Ok(analyses) => {
                    results.extend(analyses);
                    continue;
                }
                Err(e) => e,
            };

            if !err.is_llm_failure() {
                warn!(document_id = target.document_id, error = %err, "Batch could not be submitted");
                results.extend(fallback(chunk, &err));
            } else if chunk.len() > 1 {
                let (left, right) = chunk.split_at(chunk.len() / 2);
                warn!(
                    document_id = target.document_id,
                    batch = chunk.len(),
                    error = %err,
                    "Batch failed, retrying as halves"
                );
                pending.push_front((right, false));
                pending.push_front((left, false));
            } else if !retried {
                warn!(document_id = target.document_id, compliance_id = chunk[0].id, error = %err, "Retrying single requirement");
                pending.push_front((chunk, true));
            } else {
                warn!(document_id = target.document_id, compliance_id = chunk[0].id, error = %err, "Requirement falls back to manual review");
                results.extend(fallback(chunk, &err));
            }
        }
        results
    }

    async fn call(
        &self,
        target: AnalysisTarget<'_>,
        text: &str,
        chunk: &[ComplianceRequirement],
    ) -> Result<Vec<ComplianceAnalysis>, AttestError> {
        let seed = deterministic_seed(target.document_id, target.audit_id, chunk);
        let prompt = self.prompts.batch_prompt(target.document_name, text, chunk, &seed)?;
        let system = self.prompts.system_prompt()?;
        let tags = CallTags::new(ModelType::Compliance).audit(target.audit_id).document(target.document_id);
        let response = self.llm.chat_json(&prompt, Some(&system), tags).await?;
        parse_batch_response(&response, chunk, self.limits)
    }
}

fn fallback(chunk: &[ComplianceRequirement], err: &AttestError) -> Vec<ComplianceAnalysis> {
    let note = match err {
        AttestError::LLMUnavailable(_) => "LLM unavailable; manual review required".to_string(),
        AttestError::LLMParseFailed(_) => "LLM response unusable; manual review required".to_string(),
        other => format!("Analysis failed: {}", other),
    };
    chunk.iter().map(|r| ComplianceAnalysis::requires_review(r.id, &r.title, &note)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use async_trait::async_trait;
    use crate::llm::{LLMProvider, LLMResponse};
    use crate::models::ComplianceStatus;

    /// Fails any prompt listing more than `max_batch` requirements, answers
    /// the rest with one compliant analysis per listed id.
    struct BatchLimitedProvider {
        max_batch: usize,
        fail_ids: Vec<i64>,
        calls: Mutex<Vec<usize>>,
    }

    fn listed_ids(prompt: &str) -> Vec<i64> {
        prompt
            .lines()
            .filter_map(|l| l.split("compliance_id: ").nth(1))
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    }

    #[async_trait]
    impl LLMProvider for BatchLimitedProvider {
        async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<LLMResponse, AttestError> {
            let ids = listed_ids(prompt);
            self.calls.lock().unwrap().push(ids.len());
            if ids.len() > self.max_batch || ids.iter().any(|id| self.fail_ids.contains(id)) {
                return Err(AttestError::LLMUnavailable("timeout".into()));
            }
            let body: Vec<String> = ids
                .iter()
                .map(|id| format!(r#"{{"compliance_id": {}, "compliance_status": "compliant", "score": 0.9, "confidence": 0.8}}"#, id))
                .collect();
            Ok(LLMResponse {
                content: format!(r#"{{"compliance_analyses": [{}]}}"#, body.join(",")),
                input_tokens: None,
                output_tokens: None,
                model: "scripted".into(),
            })
        }
        fn provider_name(&self) -> &str { "scripted" }
        fn model_name(&self) -> &str { "scripted" }
    }

    fn req(id: i64) -> ComplianceRequirement {
        ComplianceRequirement {
            id,
            tenant_id: 1,
            framework_id: 1,
            policy_id: 1,
            sub_policy_id: 1,
            title: format!("Requirement {}", id),
            description: "Must hold".into(),
            criticality: "Medium".into(),
            is_risk: false,
            mitigation: None,
            possible_damage: None,
            mandatory: true,
            ai_bse_enabled: false,
        }
    }

    fn analyzer(provider: Arc<BatchLimitedProvider>, batch_size: usize) -> BatchAnalyzer {
        let llm = LlmClient::new(provider, Duration::from_secs(5));
        BatchAnalyzer::new(llm, PromptBuilder::default(), batch_size, ListLimits::default())
    }

    const TARGET: AnalysisTarget<'static> = AnalysisTarget { document_id: 1, audit_id: 1, document_name: "doc.txt" };

    #[tokio::test]
    async fn test_failed_batch_is_halved() {
        let provider = Arc::new(BatchLimitedProvider { max_batch: 1, fail_ids: vec![], calls: Mutex::new(vec![]) });
        let analyses = analyzer(provider.clone(), 5).analyze(TARGET, "text", &[req(1), req(2)]).await;
        assert_eq!(analyses.len(), 2);
        assert!(analyses.iter().all(|a| a.status == ComplianceStatus::Compliant));
        assert_eq!(analyses[0].compliance_id, 1);
        assert_eq!(analyses[1].compliance_id, 2);
        assert_eq!(*provider.calls.lock().unwrap(), vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn test_single_requirement_retries_once_then_falls_back() {
        let provider = Arc::new(BatchLimitedProvider { max_batch: 5, fail_ids: vec![2], calls: Mutex::new(vec![]) });
        let analyses = analyzer(provider.clone(), 5).analyze(TARGET, "text", &[req(1), req(2)]).await;
        assert_eq!(analyses[0].status, ComplianceStatus::Compliant);
        assert!(analyses[1].is_fallback());
        assert_eq!(analyses[1].score, 0.0);
        // [1,2] fails, [1] ok, [2] fails twice
        assert_eq!(*provider.calls.lock().unwrap(), vec![2, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let provider = Arc::new(BatchLimitedProvider { max_batch: 2, fail_ids: vec![], calls: Mutex::new(vec![]) });
        let reqs: Vec<_> = (1..=5).map(req).collect();
        let analyses = analyzer(provider.clone(), 2).analyze(TARGET, "text", &reqs).await;
        assert_eq!(analyses.len(), 5);
        assert_eq!(*provider.calls.lock().unwrap(), vec![2, 2, 1]);
    }
}
