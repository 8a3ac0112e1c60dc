use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::errors::AttestError;
use crate::models::{Audit, AuditFinding};
use super::risk::{self, RiskReport};
use super::signals::ExternalSignals;
use super::timeliness::{self, SlaAggregate};
use super::{SebiAuditor, SebiScope};

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub audit_id: i64,
    pub framework_id: i64,
    pub framework_name: String,
    pub generated_at: DateTime<Utc>,
    pub total_audits: usize,
    pub audits_by_status: BTreeMap<&'static str, usize>,
    pub findings_by_check: BTreeMap<&'static str, usize>,
    pub evidence_documents: i64,
    pub risk: RiskReport,
    pub sla: SlaAggregate,
}

pub fn count_by<T>(items: &[T], key: impl Fn(&T) -> &'static str) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}

pub(crate) fn build(
    auditor: &SebiAuditor,
    tenant_id: i64,
    scope: &SebiScope,
    signals: &ExternalSignals,
) -> Result<Dashboard, AttestError> {
    let db = auditor.db();
    let now = Utc::now();
    let audits = db.list_audits_for_framework(tenant_id, scope.framework.id)?;
    let evidence_counts = audits
        .iter()
        .map(|a| db.count_evidence_for_audit(tenant_id, a.id))
        .collect::<Result<Vec<_>, _>>()?;
    let findings = db.get_findings_for_framework(tenant_id, scope.framework.id)?;

    Ok(Dashboard {
        audit_id: scope.audit.id,
        framework_id: scope.framework.id,
        framework_name: scope.framework.name.clone(),
        generated_at: now,
        total_audits: audits.len(),
        audits_by_status: count_by(&audits, |a: &Audit| a.status.as_str()),
        findings_by_check: count_by(&findings, |f: &AuditFinding| f.check.code()),
        evidence_documents: evidence_counts.iter().sum(),
        risk: risk::report(scope.audit.id, scope.framework.id, &audits, &evidence_counts, &findings, signals),
        sla: timeliness::aggregate(&audits, now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_by() {
        let words = ["alpha", "beta", "alpha"];
        let counts = count_by(&words, |w| if w.starts_with('a') { "a" } else { "other" });
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("other"), Some(&1));
    }
}
