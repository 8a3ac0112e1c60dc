//! Evaluate an already-evaluated document against the other active
//! frameworks and record one mapping per (document, requirement, framework).

pub mod summary;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use crate::config::FanoutSettings;
use crate::errors::{retry_write, AttestError};
use crate::evaluation::{AnalysisTarget, EvaluationEngine};
use crate::models::{CrossFrameworkMapping, Framework};
use crate::notify;
use crate::requirements::RequirementScope;

pub use summary::FrameworkSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutRequest {
    pub document_id: i64,
    pub primary_framework_id: i64,
    #[serde(default)]
    pub audit_id: Option<i64>,
    #[serde(default)]
    pub target_framework_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutReport {
    pub document_id: i64,
    pub primary_framework_id: i64,
    pub frameworks_checked: usize,
    pub mappings_created: usize,
    pub summaries: Vec<FrameworkSummary>,
}

#[derive(Clone)]
pub struct FanoutService {
    engine: EvaluationEngine,
    max_requirements_per_framework: usize,
}

impl FanoutService {
    pub fn new(engine: EvaluationEngine, settings: &FanoutSettings) -> Self {
        Self { engine, max_requirements_per_framework: settings.max_requirements_per_framework.max(1) }
    }

    fn targets(&self, tenant_id: i64, request: &FanoutRequest) -> Result<Vec<Framework>, AttestError> {
        let db = self.engine.db();
        let Some(ids) = request.target_framework_ids.as_deref().filter(|ids| !ids.is_empty()) else {
            return Ok(db
                .list_active_frameworks(tenant_id)?
                .into_iter()
                .filter(|f| f.id != request.primary_framework_id)
                .collect());
        };

        let mut targets = Vec::new();
        for &id in ids {
            if id == request.primary_framework_id || targets.iter().any(|f: &Framework| f.id == id) {
                continue;
            }
            match db.get_framework(tenant_id, id)? {
                Some(fw) if fw.active => targets.push(fw),
                Some(_) => warn!(tenant_id, framework_id = id, "Skipping inactive target framework"),
                None => warn!(tenant_id, framework_id = id, "Skipping unknown target framework"),
            }
        }
        Ok(targets)
    }

    pub async fn run(&self, tenant_id: i64, request: &FanoutRequest) -> Result<FanoutReport, AttestError> {
        let db = self.engine.db();
        let document = match db.get_document(tenant_id, request.document_id)? {
            Some(doc) if request.audit_id.map_or(true, |a| a == doc.audit_id) => doc,
            _ => return Err(AttestError::NotFound(format!("document {}", request.document_id))),
        };
        if db.get_framework(tenant_id, request.primary_framework_id)?.is_none() {
            return Err(AttestError::NotFound(format!("framework {}", request.primary_framework_id)));
        }

        let text = self
            .engine
            .extractor()
            .extract_for_evaluation(&document.stored_path, &document.mime_type)
            .await?;
        let targets = self.targets(tenant_id, request)?;
        info!(tenant_id, document_id = document.id, targets = targets.len(), "Starting cross-framework fan-out");

        let target = AnalysisTarget {
            document_id: document.id,
            audit_id: document.audit_id,
            document_name: &document.logical_name,
        };
        let mut report = FanoutReport {
            document_id: document.id,
            primary_framework_id: request.primary_framework_id,
            frameworks_checked: 0,
            mappings_created: 0,
            summaries: Vec::with_capacity(targets.len()),
        };

        'frameworks: for framework in &targets {
            let mut requirements = self.engine.resolver().resolve(tenant_id, &RequirementScope::framework(framework.id))?;
            requirements.truncate(self.max_requirements_per_framework);

            let analyses = if requirements.is_empty() {
                Vec::new()
            } else {
                self.engine.analyzer().analyze(target, &text, &requirements).await
            };

            for analysis in &analyses {
                let mapping = CrossFrameworkMapping {
                    document_id: document.id,
                    compliance_id: analysis.compliance_id,
                    framework_id: framework.id,
                    status: analysis.status,
                    score: analysis.score,
                    risk_level: analysis.risk_level,
                    recommendations: analysis.recommendations.clone(),
                    updated_at: Utc::now(),
                };
                match retry_write("mapping_upsert", self.engine.write_retry(), || db.upsert_mapping(tenant_id, &mapping)).await {
                    Ok(()) => report.mappings_created += 1,
                    Err(AttestError::NotFound(what)) => {
                        warn!(tenant_id, document_id = document.id, missing = %what, "Document removed during fan-out");
                        break 'frameworks;
                    }
                    Err(e) => return Err(e),
                }
            }

            let summary = FrameworkSummary::from_analyses(framework, &requirements, &analyses);
            info!(
                tenant_id,
                document_id = document.id,
                framework_id = framework.id,
                requirements = requirements.len(),
                overall_status = %summary.overall_status,
                "Framework checked"
            );
            report.summaries.push(summary);
            report.frameworks_checked += 1;
        }

        self.engine.notifications().dispatch(
            notify::CROSS_FRAMEWORK_CHECKED,
            json!({
                "tenant_id": tenant_id,
                "document_id": document.id,
                "frameworks_checked": report.frameworks_checked,
                "mappings_created": report.mappings_created,
            }),
        );
        Ok(report)
    }
}
