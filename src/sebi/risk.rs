use chrono::Duration;
use serde::Serialize;
use crate::errors::AttestError;
use crate::models::{Audit, AuditFinding, RiskLevel};
use super::signals::ExternalSignals;
use super::timeliness::round1;
use super::{SebiAuditor, SebiScope, CORRECTION_RE};

const FILING_DELAY_WEIGHT: f64 = 0.30;
const DISCLOSURE_CORRECTION_WEIGHT: f64 = 0.20;
const GOVERNANCE_GAP_WEIGHT: f64 = 0.20;
const INSIDER_TRADE_WEIGHT: f64 = 0.15;
const AUDITOR_REMARKS_WEIGHT: f64 = 0.15;

const HIGH_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    Computed,
    External,
    RequiresExternalData,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskFactor {
    pub name: &'static str,
    pub weight: f64,
    /// Normalized to [0, 1].
    pub value: f64,
    pub weighted: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub source: FactorSource,
    pub description: String,
}

impl RiskFactor {
    fn computed(name: &'static str, weight: f64, count: usize, divisor: f64, description: String) -> Self {
        let value = (count as f64 / divisor).min(1.0);
        Self { name, weight, value, weighted: value * weight, count: Some(count), source: FactorSource::Computed, description }
    }

    fn external(name: &'static str, weight: f64, signal: Option<f64>) -> Self {
        match ExternalSignals::factor(signal) {
            Some(value) => Self {
                name,
                weight,
                value,
                weighted: value * weight,
                count: None,
                source: FactorSource::External,
                description: format!("{} factor supplied externally", name.replace('_', " ")),
            },
            None => Self {
                name,
                weight,
                value: 0.0,
                weighted: 0.0,
                count: None,
                source: FactorSource::RequiresExternalData,
                description: format!("{} requires external data", name.replace('_', " ")),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub audit_id: i64,
    pub framework_id: i64,
    /// Weighted factor sum on a 0-100 scale.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub high_risk_factors: usize,
    pub contributing_factors: Vec<String>,
    pub factors: Vec<RiskFactor>,
}

pub fn level_for(total: f64) -> RiskLevel {
    if total >= 0.7 {
        RiskLevel::High
    } else if total >= 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn completed_late(audit: &Audit) -> bool {
    audit
        .completion_date
        .is_some_and(|done| done - audit.due_date > Duration::days(3))
}

/// Pure scoring over framework history; `evidence_counts[i]` belongs to `audits[i]`.
pub fn score(
    audits: &[Audit],
    evidence_counts: &[i64],
    findings: &[AuditFinding],
    signals: &ExternalSignals,
) -> (f64, Vec<RiskFactor>) {
    let late = audits.iter().filter(|a| completed_late(a)).count();
    let corrections = findings.iter().filter(|f| CORRECTION_RE.is_match(&f.comments)).count();
    let gaps = audits
        .iter()
        .zip(evidence_counts.iter().copied().chain(std::iter::repeat(0)))
        .filter(|(a, evidence)| {
            a.scope.as_deref().map_or(true, |s| s.trim().is_empty())
                || a.objective.as_deref().map_or(true, |o| o.trim().is_empty())
                || *evidence == 0
        })
        .count();

    let factors = vec![
        RiskFactor::computed(
            "filing_delays",
            FILING_DELAY_WEIGHT,
            late,
            10.0,
            format!("{} filings completed more than 3 days past due", late),
        ),
        RiskFactor::computed(
            "disclosure_corrections",
            DISCLOSURE_CORRECTION_WEIGHT,
            corrections,
            5.0,
            format!("{} findings record corrected or amended disclosures", corrections),
        ),
        RiskFactor::computed(
            "governance_gaps",
            GOVERNANCE_GAP_WEIGHT,
            gaps,
            3.0,
            format!("{} audits missing scope, objective or evidence", gaps),
        ),
        RiskFactor::external("insider_trade_anomalies", INSIDER_TRADE_WEIGHT, signals.insider_trade_anomalies),
        RiskFactor::external("auditor_remarks", AUDITOR_REMARKS_WEIGHT, signals.auditor_remarks),
    ];
    let total = factors.iter().map(|f| f.weighted).sum::<f64>().clamp(0.0, 1.0);
    ((total * 1000.0).round() / 1000.0, factors)
}

pub(crate) fn analyze(
    auditor: &SebiAuditor,
    tenant_id: i64,
    scope: &SebiScope,
    signals: &ExternalSignals,
) -> Result<RiskReport, AttestError> {
    let db = auditor.db();
    let audits = db.list_audits_for_framework(tenant_id, scope.framework.id)?;
    let evidence_counts = audits
        .iter()
        .map(|a| db.count_evidence_for_audit(tenant_id, a.id))
        .collect::<Result<Vec<_>, _>>()?;
    let findings = db.get_findings_for_framework(tenant_id, scope.framework.id)?;
    Ok(report(scope.audit.id, scope.framework.id, &audits, &evidence_counts, &findings, signals))
}

pub fn report(
    audit_id: i64,
    framework_id: i64,
    audits: &[Audit],
    evidence_counts: &[i64],
    findings: &[AuditFinding],
    signals: &ExternalSignals,
) -> RiskReport {
    let (total, factors) = score(audits, evidence_counts, findings, signals);
    RiskReport {
        audit_id,
        framework_id,
        risk_score: round1(total * 100.0),
        risk_level: level_for(total),
        high_risk_factors: factors.iter().filter(|f| f.value > HIGH_FACTOR).count(),
        contributing_factors: factors.iter().filter(|f| f.value > 0.0).map(|f| f.description.clone()).collect(),
        factors,
    }
}
