//! Turns a requirement analysis into an audit-scoped finding.

pub mod normalize;

use tracing::{debug, warn};
use crate::llm::{CallTags, LlmClient, ModelType};
use crate::models::{Audit, AuditFinding, ComplianceAnalysis, ComplianceRequirement};
use crate::prompts::{deterministic_seed, PromptBuilder};

pub use normalize::{fallback_finding, normalize_finding};

#[derive(Clone)]
pub struct FindingEnricher {
    llm: LlmClient,
    prompts: PromptBuilder,
    enabled: bool,
}

impl FindingEnricher {
    pub fn new(llm: LlmClient, prompts: PromptBuilder, enabled: bool) -> Self {
        Self { llm, prompts, enabled }
    }

    /// Never fails: when enrichment is off, the analysis is itself a fallback,
    /// or the model call goes wrong, the finding is derived from the analysis.
    pub async fn enrich(
        &self,
        audit: &Audit,
        document_id: i64,
        requirement: &ComplianceRequirement,
        analysis: &ComplianceAnalysis,
    ) -> AuditFinding {
        if !self.enabled || analysis.is_fallback() {
            return fallback_finding(audit.id, requirement, analysis);
        }

        let seed = deterministic_seed(document_id, audit.id, std::slice::from_ref(requirement));
        let prompt = match self.prompts.enrichment_prompt(audit, requirement, analysis, &seed) {
            Ok(p) => p,
            Err(e) => {
                warn!(audit_id = audit.id, compliance_id = requirement.id, error = %e, "Enrichment prompt failed");
                return fallback_finding(audit.id, requirement, analysis);
            }
        };
        let tags = CallTags::new(ModelType::Recommendations).audit(audit.id).document(document_id);
        match self.llm.chat_json(&prompt, None, tags).await {
            Ok(raw) => {
                debug!(audit_id = audit.id, compliance_id = requirement.id, "Finding enriched");
                normalize_finding(&raw, audit.id, requirement, analysis)
            }
            Err(e) => {
                warn!(
                    audit_id = audit.id,
                    compliance_id = requirement.id,
                    error = %e,
                    "Enrichment failed, deriving finding from analysis"
                );
                fallback_finding(audit.id, requirement, analysis)
            }
        }
    }
}
