use sha2::{Digest, Sha256};
use crate::errors::AttestError;
use crate::models::{Audit, ComplianceAnalysis, ComplianceRequirement};
use super::loader::{PromptLoader, PromptVariables};

/// Derive a stable seed from (document, audit, requirement content). The same
/// inputs always produce the same seed, nudging backends toward repeatable output.
pub fn deterministic_seed(document_id: i64, audit_id: i64, requirements: &[ComplianceRequirement]) -> String {
    let mut content = Sha256::new();
    for req in requirements {
        content.update(req.id.to_le_bytes());
        content.update(req.title.as_bytes());
        content.update([0u8]);
        content.update(req.description.as_bytes());
        content.update([0u8]);
    }
    let content_hash = content.finalize();

    let mut seed = Sha256::new();
    seed.update(document_id.to_le_bytes());
    seed.update(audit_id.to_le_bytes());
    seed.update(content_hash);
    hex::encode(&seed.finalize()[..8])
}

/// Assembles the evaluation and enrichment prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    loader: PromptLoader,
}

impl PromptBuilder {
    pub fn new(loader: PromptLoader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &PromptLoader {
        &self.loader
    }

    pub fn system_prompt(&self) -> Result<String, AttestError> {
        Ok(self.loader.load("compliance-system")?.trim().to_string())
    }

    /// Batch evaluation prompt for one document and up to a batch of requirements.
    pub fn batch_prompt(
        &self,
        document_name: &str,
        document_text: &str,
        requirements: &[ComplianceRequirement],
        seed: &str,
    ) -> Result<String, AttestError> {
        if requirements.is_empty() {
            return Err(AttestError::InvalidInput("cannot build a prompt for zero requirements".into()));
        }
        let vars = PromptVariables::new()
            .set("DOCUMENT_NAME", document_name)
            .set("DOCUMENT_TEXT", document_text)
            .set("REQUIREMENT_COUNT", requirements.len().to_string())
            .set("REQUIREMENTS", render_requirements(requirements));
        let prompt = self.loader.render("compliance-batch", &vars)?;
        Ok(with_seed(prompt, seed))
    }

    /// Enrichment prompt for one analysis in the context of its audit.
    pub fn enrichment_prompt(
        &self,
        audit: &Audit,
        requirement: &ComplianceRequirement,
        analysis: &ComplianceAnalysis,
        seed: &str,
    ) -> Result<String, AttestError> {
        let vars = PromptVariables::new()
            .set("AUDIT_TITLE", audit.title.as_str())
            .set("AUDIT_TYPE", audit.audit_type.as_str())
            .set_opt("AUDIT_SCOPE", audit.scope.as_deref())
            .set_opt("AUDIT_OBJECTIVE", audit.objective.as_deref())
            .set_opt("BUSINESS_UNIT", audit.business_unit.as_deref())
            .set("DUE_DATE", audit.due_date.format("%Y-%m-%d").to_string())
            .set("REQUIREMENT_TITLE", requirement.title.as_str())
            .set("REQUIREMENT_DESCRIPTION", requirement.description.as_str())
            .set("CRITICALITY", requirement.criticality.as_str())
            .set_opt("MITIGATION", requirement.mitigation.as_deref())
            .set_opt("POSSIBLE_DAMAGE", requirement.possible_damage.as_deref())
            .set("ANALYSIS_JSON", serde_json::to_string_pretty(analysis)?);
        let prompt = self.loader.render("finding-enrichment", &vars)?;
        Ok(with_seed(prompt, seed))
    }
}

fn render_requirements(requirements: &[ComplianceRequirement]) -> String {
    requirements
        .iter()
        .enumerate()
        .map(|(i, req)| {
            let mut block = format!(
                "[{}] compliance_id: {}\nTitle: {}\nRequirement: {}\nCriticality: {}",
                i + 1,
                req.id,
                req.title.trim(),
                req.description.trim(),
                req.criticality
            );
            if req.is_risk {
                block.push_str("\nFlagged as a risk item");
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn with_seed(prompt: String, seed: &str) -> String {
    format!("{}\n\nEvaluation seed: {}", prompt.trim_end(), seed)
}
