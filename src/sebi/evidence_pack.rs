//! Export bundle of audit evidence, shaped for a particular regulatory use.

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::errors::AttestError;
use crate::models::{Audit, AuditFinding, ComplianceRequirement, EvidenceDocument, FindingCheck, MajorMinor};
use super::signals::ExternalSignals;
use super::{placeholder, SebiAuditor, SebiScope};

const MAX_SNIPPETS_PER_CLAUSE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    SebiInspection,
    Adjudication,
    InvestorGrievance,
    Enforcement,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SebiInspection => "sebi_inspection",
            Self::Adjudication => "adjudication",
            Self::InvestorGrievance => "investor_grievance",
            Self::Enforcement => "enforcement",
        }
    }

    /// Which findings the bundle carries.
    fn includes(&self, finding: &AuditFinding) -> bool {
        match self {
            Self::SebiInspection | Self::InvestorGrievance => true,
            Self::Adjudication => matches!(finding.check, FindingCheck::NotCompliant | FindingCheck::PartiallyCompliant),
            Self::Enforcement => finding.major_minor == MajorMinor::Major,
        }
    }
}

impl Default for UseCase {
    fn default() -> Self {
        Self::SebiInspection
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UseCase {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sebi_inspection" | "inspection" => Ok(Self::SebiInspection),
            "adjudication" => Ok(Self::Adjudication),
            "investor_grievance" | "grievance" => Ok(Self::InvestorGrievance),
            "enforcement" => Ok(Self::Enforcement),
            other => Err(AttestError::InvalidInput(format!("unknown evidence pack use case: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClauseEvidence {
    pub compliance_id: i64,
    pub requirement: String,
    pub check: FindingCheck,
    pub major_minor: MajorMinor,
    pub severity_rating: u8,
    pub comments: String,
    pub recommendation: String,
    pub review_status: String,
    pub evidence: Vec<String>,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    DueDate,
    CompletionDate,
    DocumentUploaded,
    DocumentProcessed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampedProof {
    pub kind: ProofKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackSummary {
    pub clauses: usize,
    pub non_compliant: usize,
    pub major_findings: usize,
    pub documents: usize,
    pub proofs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidencePack {
    pub audit_id: i64,
    pub audit_title: String,
    pub framework_id: i64,
    pub framework_name: String,
    pub use_case: UseCase,
    pub generated_at: DateTime<Utc>,
    pub clause_wise_evidence: Vec<ClauseEvidence>,
    pub timestamped_proofs: Vec<TimestampedProof>,
    pub disclosure_timeline: Vec<TimelineEvent>,
    pub risk_anomaly_logs: Value,
    pub summary: PackSummary,
}

fn clause(finding: &AuditFinding, requirements: &[ComplianceRequirement], documents: &[EvidenceDocument]) -> ClauseEvidence {
    let requirement = requirements
        .iter()
        .find(|r| r.id == finding.compliance_id)
        .map(|r| r.title.clone())
        .unwrap_or_else(|| format!("Compliance {}", finding.compliance_id));

    let mut evidence = Vec::new();
    let mut names = Vec::new();
    for doc in documents {
        let snippets: Vec<&String> = doc
            .analyses
            .iter()
            .filter(|a| a.compliance_id == finding.compliance_id)
            .flat_map(|a| a.evidence_snippets.iter())
            .collect();
        let mapped = doc.mapping.compliance_id == Some(finding.compliance_id);
        if snippets.is_empty() && !mapped {
            continue;
        }
        if !names.contains(&doc.logical_name) {
            names.push(doc.logical_name.clone());
        }
        for s in snippets {
            if evidence.len() < MAX_SNIPPETS_PER_CLAUSE && !evidence.contains(s) {
                evidence.push(s.clone());
            }
        }
    }

    ClauseEvidence {
        compliance_id: finding.compliance_id,
        requirement,
        check: finding.check,
        major_minor: finding.major_minor,
        severity_rating: finding.severity_rating,
        comments: finding.comments.clone(),
        recommendation: finding.recommendation.clone(),
        review_status: finding.review_status.clone(),
        evidence,
        documents: names,
    }
}

fn proofs(audit: &Audit, documents: &[EvidenceDocument]) -> Vec<TimestampedProof> {
    let bare = |kind, timestamp| TimestampedProof { kind, timestamp, document_id: None, document_name: None, content_sha256: None };
    let mut proofs = vec![bare(ProofKind::DueDate, audit.due_date)];
    if let Some(done) = audit.completion_date {
        proofs.push(bare(ProofKind::CompletionDate, done));
    }
    for doc in documents {
        let stamped = |kind, timestamp| TimestampedProof {
            kind,
            timestamp,
            document_id: Some(doc.id),
            document_name: Some(doc.logical_name.clone()),
            content_sha256: doc.content_sha256.clone(),
        };
        proofs.push(stamped(ProofKind::DocumentUploaded, doc.uploaded_at));
        if let Some(at) = doc.processed_at {
            proofs.push(stamped(ProofKind::DocumentProcessed, at));
        }
    }
    proofs
}

fn timeline(audit: &Audit, documents: &[EvidenceDocument]) -> Vec<TimelineEvent> {
    let mut events = vec![
        TimelineEvent { timestamp: audit.created_at, event: "audit_created".into(), detail: audit.title.clone() },
        TimelineEvent { timestamp: audit.due_date, event: "filing_due".into(), detail: audit.title.clone() },
    ];
    for doc in documents {
        events.push(TimelineEvent {
            timestamp: doc.uploaded_at,
            event: "evidence_uploaded".into(),
            detail: doc.logical_name.clone(),
        });
        if let Some(at) = doc.processed_at {
            let outcome = doc.compliance_status.map(|s| s.as_str()).unwrap_or(doc.processing_state.as_str());
            events.push(TimelineEvent {
                timestamp: at,
                event: "evidence_evaluated".into(),
                detail: format!("{}: {}", doc.logical_name, outcome),
            });
        }
    }
    if let Some(done) = audit.completion_date {
        events.push(TimelineEvent { timestamp: done, event: "filing_completed".into(), detail: audit.status.as_str().to_string() });
    }
    events.sort_by_key(|e| e.timestamp);
    events
}

fn anomaly_logs(signals: &ExternalSignals) -> Value {
    let insider = match ExternalSignals::factor(signals.insider_trade_anomalies) {
        Some(v) => json!({"status": "external", "factor": v}),
        None => placeholder("insider trade anomalies"),
    };
    let silence = match &signals.event_silence {
        Some(events) => json!({"status": "external", "events": events}),
        None => placeholder("event silence versus price spike"),
    };
    let promoter = match &signals.promoter_trades {
        Some(trades) => json!({"status": "external", "trades": trades}),
        None => placeholder("promoter trades around disclosures"),
    };
    json!({"insider_trade_anomalies": insider, "event_silence": silence, "promoter_trades": promoter})
}

/// Assemble a pack from already-loaded rows.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    scope_audit: &Audit,
    framework_name: &str,
    use_case: UseCase,
    findings: &[AuditFinding],
    requirements: &[ComplianceRequirement],
    documents: &[EvidenceDocument],
    signals: &ExternalSignals,
    generated_at: DateTime<Utc>,
) -> EvidencePack {
    let clause_wise_evidence: Vec<ClauseEvidence> = findings
        .iter()
        .filter(|f| use_case.includes(f))
        .map(|f| clause(f, requirements, documents))
        .collect();
    let timestamped_proofs = proofs(scope_audit, documents);
    let summary = PackSummary {
        clauses: clause_wise_evidence.len(),
        non_compliant: clause_wise_evidence.iter().filter(|c| c.check == FindingCheck::NotCompliant).count(),
        major_findings: clause_wise_evidence.iter().filter(|c| c.major_minor == MajorMinor::Major).count(),
        documents: documents.len(),
        proofs: timestamped_proofs.len(),
    };
    EvidencePack {
        audit_id: scope_audit.id,
        audit_title: scope_audit.title.clone(),
        framework_id: scope_audit.framework_id,
        framework_name: framework_name.to_string(),
        use_case,
        generated_at,
        clause_wise_evidence,
        disclosure_timeline: timeline(scope_audit, documents),
        timestamped_proofs,
        risk_anomaly_logs: anomaly_logs(signals),
        summary,
    }
}

pub(crate) fn build(
    auditor: &SebiAuditor,
    tenant_id: i64,
    scope: &SebiScope,
    use_case: UseCase,
    signals: &ExternalSignals,
) -> Result<EvidencePack, AttestError> {
    let db = auditor.db();
    let findings = db.get_findings_for_audit(tenant_id, scope.audit.id)?;
    let mut requirements = Vec::new();
    for finding in &findings {
        if let Some(req) = db.get_requirement(tenant_id, finding.compliance_id)? {
            requirements.push(req);
        }
    }
    let documents = db.list_documents_for_audit(tenant_id, scope.audit.id)?;
    Ok(assemble(
        &scope.audit,
        &scope.framework.name,
        use_case,
        &findings,
        &requirements,
        &documents,
        signals,
        Utc::now(),
    ))
}
