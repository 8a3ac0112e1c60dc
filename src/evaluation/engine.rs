use std::path::PathBuf;
use serde_json::json;
use tracing::{error, info, warn};
use crate::config::{AttestConfig, EvaluationSettings};
use crate::db::Database;
use crate::enrichment::FindingEnricher;
use crate::errors::{retry_write, AttestError, RetryConfig};
use crate::extract::TextExtractor;
use crate::llm::LlmClient;
use crate::models::{
    Audit, ComplianceAnalysis, ComplianceRequirement, DocumentVerdict, EvidenceDocument, ProcessingState,
};
use crate::notify::{self, NotificationHub};
use crate::prompts::{PromptBuilder, PromptLoader};
use crate::requirements::RequirementResolver;
use crate::utils::truncation::{truncate_error, truncate_with_ellipsis, MAX_COMMENT_LENGTH};
use super::aggregate::aggregate;
use super::analyzer::{AnalysisTarget, BatchAnalyzer};
use super::normalize::ListLimits;

const AI_VERIFIER: &str = "AI";

/// Evaluates one evidence document end to end: extraction, requirement
/// resolution, batched analysis, aggregation and all persistence.
#[derive(Clone)]
pub struct EvaluationEngine {
    db: Database,
    extractor: TextExtractor,
    resolver: RequirementResolver,
    analyzer: BatchAnalyzer,
    enricher: FindingEnricher,
    notifications: NotificationHub,
    write_retry: RetryConfig,
}

impl EvaluationEngine {
    pub fn new(
        db: Database,
        llm: LlmClient,
        prompts: PromptBuilder,
        extractor: TextExtractor,
        settings: &EvaluationSettings,
    ) -> Self {
        let analyzer = BatchAnalyzer::new(llm.clone(), prompts.clone(), settings.batch_size, ListLimits::from_settings(settings));
        let enricher = FindingEnricher::new(llm, prompts, settings.enrich_findings);
        Self {
            resolver: RequirementResolver::new(db.clone()),
            db,
            extractor,
            analyzer,
            enricher,
            notifications: NotificationHub::disabled(),
            write_retry: RetryConfig::persistence(),
        }
    }

    /// Wire every collaborator from configuration.
    pub fn from_config(db: Database, config: &AttestConfig) -> Result<Self, AttestError> {
        let llm = LlmClient::from_settings(&config.llm)?;
        let prompts = PromptBuilder::new(PromptLoader::new(config.prompts_dir.as_ref().map(PathBuf::from)));
        let extractor = TextExtractor::new(&config.storage.media_root, &config.evaluation);
        let notifications = NotificationHub::from_settings(&config.notifications)?;
        Ok(Self::new(db, llm, prompts, extractor, &config.evaluation).with_notifications(notifications))
    }

    pub fn with_notifications(mut self, notifications: NotificationHub) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Retry policy for result writes that hit a busy database.
    pub fn write_retry(&self) -> &RetryConfig {
        &self.write_retry
    }

    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    pub fn analyzer(&self) -> &BatchAnalyzer {
        &self.analyzer
    }

    pub fn resolver(&self) -> &RequirementResolver {
        &self.resolver
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Load a document and verify it belongs to the audit.
    pub fn load_document(&self, tenant_id: i64, audit_id: i64, document_id: i64) -> Result<EvidenceDocument, AttestError> {
        match self.db.get_document(tenant_id, document_id)? {
            Some(doc) if doc.audit_id == audit_id => Ok(doc),
            _ => Err(AttestError::NotFound(format!("document {} in audit {}", document_id, audit_id))),
        }
    }

    /// Evaluate a document. Extraction problems produce a `failed` verdict
    /// rather than an error; a missing audit or document is `NotFound`.
    pub async fn evaluate_document(
        &self,
        tenant_id: i64,
        audit_id: i64,
        document_id: i64,
        compliance_ids: Option<&[i64]>,
    ) -> Result<DocumentVerdict, AttestError> {
        let audit = self.db.require_audit(tenant_id, audit_id)?;
        let document = self.load_document(tenant_id, audit_id, document_id)?;
        let group = self.db.document_group(&document)?;
        let group_ids: Vec<i64> = group.iter().map(|d| d.id).collect();

        info!(tenant_id, audit_id, document_id, rows = group_ids.len(), "Evaluating document");
        self.db.set_documents_state(tenant_id, &group_ids, ProcessingState::InProgress, None)?;

        let text = match self.extractor.extract_for_evaluation(&document.stored_path, &document.mime_type).await {
            Ok(text) => text,
            Err(e) => {
                let message = truncate_error(&format!("Text extraction failed: {}", e));
                warn!(tenant_id, audit_id, document_id, error = %e, "Document could not be read");
                self.db.set_documents_state(tenant_id, &group_ids, ProcessingState::Failed, Some(&message))?;
                return match e {
                    AttestError::ExtractionFailed(_) => Ok(DocumentVerdict::failed(document_id, audit_id, &message)),
                    other => Err(other),
                };
            }
        };

        let mappings: Vec<_> = group.iter().map(|d| d.mapping.clone()).collect();
        let requirements = self.resolver.resolve_for_document(tenant_id, &audit, &mappings, compliance_ids)?;

        if requirements.is_empty() {
            let message = "No requirements in scope for this document";
            info!(tenant_id, audit_id, document_id, "No requirements in scope");
            let agg = aggregate(&[], &[]);
            self.db.store_document_verdict(tenant_id, &group_ids, agg.status, agg.confidence, &[], Some(message))?;
            return Ok(DocumentVerdict {
                document_id,
                audit_id,
                processing_state: ProcessingState::Completed,
                compliance_status: agg.status,
                confidence: agg.confidence,
                analyses: Vec::new(),
                message: Some(message.to_string()),
            });
        }

        let target = AnalysisTarget { document_id, audit_id, document_name: &document.logical_name };
        let analyses = self.analyzer.analyze(target, &text, &requirements).await;
        let agg = aggregate(&analyses, &requirements);

        let fallbacks = analyses.iter().filter(|a| a.is_fallback()).count();
        let note = (fallbacks > 0)
            .then(|| format!("{} of {} requirements require manual review", fallbacks, analyses.len()));
        retry_write("verdict_store", &self.write_retry, || {
            self.db.store_document_verdict(tenant_id, &group_ids, agg.status, agg.confidence, &analyses, note.as_deref())
        })
        .await?;

        let mut message = note;
        match self.persist_results(tenant_id, &audit, document_id, &requirements, &analyses).await {
            Ok(()) => {}
            Err(AttestError::NotFound(what)) => {
                warn!(tenant_id, audit_id, document_id, missing = %what, "Audit removed during evaluation, dropping remaining writes");
                message = Some("Audit was removed during evaluation".to_string());
            }
            Err(e) => {
                error!(tenant_id, audit_id, document_id, error = %e, "Failed to persist evaluation results");
                return Err(e);
            }
        }

        info!(
            tenant_id,
            audit_id,
            document_id,
            status = %agg.status,
            confidence = agg.confidence,
            requirements = requirements.len(),
            fallbacks,
            "Document evaluated"
        );
        self.notifications.dispatch(
            notify::DOCUMENT_EVALUATED,
            json!({
                "tenant_id": tenant_id,
                "audit_id": audit_id,
                "document_id": document_id,
                "document_name": document.logical_name,
                "compliance_status": agg.status,
                "confidence": agg.confidence,
            }),
        );

        Ok(DocumentVerdict {
            document_id,
            audit_id,
            processing_state: ProcessingState::Completed,
            compliance_status: agg.status,
            confidence: agg.confidence,
            analyses,
            message,
        })
    }

    /// Checklist rows, enriched findings and the audit completion check.
    async fn persist_results(
        &self,
        tenant_id: i64,
        audit: &Audit,
        document_id: i64,
        requirements: &[ComplianceRequirement],
        analyses: &[ComplianceAnalysis],
    ) -> Result<(), AttestError> {
        for analysis in analyses {
            let Some(requirement) = requirements.iter().find(|r| r.id == analysis.compliance_id) else {
                continue;
            };
            if !analysis.is_fallback() {
                let comment = checklist_comment(analysis);
                retry_write("checklist_upsert", &self.write_retry, || {
                    self.db.upsert_checklist(tenant_id, requirement, analysis.status.checklist_code(), &comment, AI_VERIFIER)
                })
                .await?;
            }
            let finding = self.enricher.enrich(audit, document_id, requirement, analysis).await;
            retry_write("finding_upsert", &self.write_retry, || self.db.upsert_finding(tenant_id, &finding)).await?;
        }

        if self.db.complete_audit_if_satisfied(tenant_id, audit.id, document_id)? {
            info!(tenant_id, audit_id = audit.id, "Audit completed");
            self.notifications.dispatch(
                notify::AUDIT_COMPLETED,
                json!({"tenant_id": tenant_id, "audit_id": audit.id, "title": audit.title}),
            );
        }
        Ok(())
    }
}

/// Short reviewer-facing summary stored with the checklist row.
fn checklist_comment(analysis: &ComplianceAnalysis) -> String {
    let mut parts = vec![format!(
        "AI verdict: {} (score {:.2}, confidence {:.2}).",
        analysis.status,
        analysis.score,
        analysis.effective_confidence()
    )];
    if let Some(snippet) = analysis.evidence_snippets.first() {
        parts.push(format!("Evidence: \"{}\"", snippet));
    }
    if !analysis.missing.is_empty() {
        parts.push(format!("Missing: {}", analysis.missing.join("; ")));
    }
    if let Some(rec) = analysis.recommendations.first() {
        parts.push(format!("Recommendation: {}", rec));
    }
    truncate_with_ellipsis(&parts.join(" "), MAX_COMMENT_LENGTH)
}
