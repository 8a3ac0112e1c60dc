use tracing::{info, warn};
use crate::errors::AttestError;
use crate::evaluation::EvaluationEngine;
use crate::fanout::{FanoutRequest, FanoutService};
use crate::jobs::JobRunner;
use crate::models::Audit;

/// Background work an upload may trigger.
#[derive(Clone)]
pub struct Followups {
    jobs: JobRunner,
    engine: EvaluationEngine,
    fanout: FanoutService,
    auto_check: bool,
    auto_fanout: bool,
}

impl Followups {
    pub fn new(jobs: JobRunner, engine: EvaluationEngine, fanout: FanoutService, auto_check: bool, auto_fanout: bool) -> Self {
        Self { jobs, engine, fanout, auto_check, auto_fanout }
    }

    /// Spawn the configured jobs and return their names. Fan-out runs after
    /// the check when both are enabled.
    pub fn schedule(&self, tenant_id: i64, audit: &Audit, document_id: i64) -> Vec<String> {
        let audit_id = audit.id;
        let request = FanoutRequest {
            document_id,
            primary_framework_id: audit.framework_id,
            audit_id: Some(audit_id),
            target_framework_ids: None,
        };

        match (self.auto_check, self.auto_fanout) {
            (false, false) => Vec::new(),
            (true, auto_fanout) => {
                let engine = self.engine.clone();
                let fanout = self.fanout.clone();
                self.jobs.spawn("auto_compliance_check", audit_id, async move {
                    let verdict = engine.evaluate_document(tenant_id, audit_id, document_id, None).await?;
                    info!(tenant_id, audit_id, document_id, status = %verdict.compliance_status, "Auto compliance check finished");
                    if auto_fanout {
                        let report = fanout.run(tenant_id, &request).await?;
                        info!(tenant_id, document_id, mappings = report.mappings_created, "Auto fan-out finished");
                    }
                    Ok::<_, AttestError>(())
                });
                let mut names = vec!["auto_compliance_check".to_string()];
                if auto_fanout {
                    names.push("cross_framework_fanout".to_string());
                }
                names
            }
            (false, true) => {
                let fanout = self.fanout.clone();
                self.jobs.spawn("cross_framework_fanout", audit_id, async move {
                    match fanout.run(tenant_id, &request).await {
                        Ok(report) => {
                            info!(tenant_id, document_id, mappings = report.mappings_created, "Auto fan-out finished");
                            Ok(())
                        }
                        Err(e) => {
                            warn!(tenant_id, document_id, error = %e, "Auto fan-out failed");
                            Err(e)
                        }
                    }
                });
                vec!["cross_framework_fanout".to_string()]
            }
        }
    }
}
