use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use crate::errors::AttestError;
use crate::evaluation::normalize::{bounded_list, unit_interval, ListLimits};
use crate::extract::fit_to_cap;
use crate::models::{Audit, EvidenceDocument, RiskLevel};
use crate::prompts::PromptVariables;
use crate::utils::formatting::format_percent;
use crate::utils::similarity::similarity_ratio;
use super::timeliness::round1;
use super::{Check, SebiAuditor, SebiScope};

pub const MAX_PERIOD_PAIRS: usize = 10;
pub const MAX_DOCUMENT_COMPARISONS: usize = 10;
pub const PERIOD_WINDOW_DAYS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyStatus {
    Consistent,
    MinorDiscrepancies,
    MajorDiscrepancies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    PartialMatch,
    Mismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossPeriodResult {
    pub earlier_audit_id: i64,
    pub later_audit_id: i64,
    pub days_apart: i64,
    pub consistency_score: f64,
    pub status: ConsistencyStatus,
    pub issues: Vec<String>,
    pub recommendation: String,
}

impl CrossPeriodResult {
    pub fn has_issue(&self) -> bool {
        self.status != ConsistencyStatus::Consistent
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossDocumentResult {
    pub document_id: i64,
    pub other_document_id: i64,
    pub other_document_name: String,
    pub textual_similarity: f64,
    pub match_score: f64,
    pub status: MatchStatus,
    pub discrepancies: Vec<String>,
    pub recommendation: String,
}

impl CrossDocumentResult {
    pub fn has_issue(&self) -> bool {
        self.status != MatchStatus::Matched
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NarrativeInconsistency {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub severity: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct NarrativeResult {
    pub document_id: i64,
    pub inconsistencies: Vec<NarrativeInconsistency>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    pub audit_id: i64,
    pub framework_id: i64,
    pub document_id: Option<i64>,
    /// Percentage of completed checks without issues; `None` when nothing could be checked.
    pub accuracy_score: Option<f64>,
    pub accuracy_display: String,
    pub total_checks: usize,
    pub accurate_checks: usize,
    pub issues_found: usize,
    pub cross_period: Vec<Check<CrossPeriodResult>>,
    pub cross_document: Vec<Check<CrossDocumentResult>>,
    pub narrative: Option<Check<NarrativeResult>>,
    /// Reserved for a numeric cross-footing checker.
    pub arithmetic_checks: Vec<Value>,
    pub duplicate_disclosures: Vec<Value>,
}

fn text(value: Option<&Value>) -> String {
    value.and_then(|v| v.as_str()).unwrap_or_default().trim().to_string()
}

fn label(raw: &Value, key: &str) -> String {
    text(raw.get(key)).to_lowercase().replace([' ', '-'], "_")
}

pub fn parse_cross_period(raw: &Value, earlier: &Audit, later: &Audit) -> CrossPeriodResult {
    let score = raw.get("consistency_score").and_then(unit_interval).unwrap_or(0.0);
    let status = match label(raw, "status").as_str() {
        "consistent" => ConsistencyStatus::Consistent,
        "minor_discrepancies" | "minor_discrepancy" | "minor" => ConsistencyStatus::MinorDiscrepancies,
        "major_discrepancies" | "major_discrepancy" | "major" | "inconsistent" => ConsistencyStatus::MajorDiscrepancies,
        _ if score >= 0.8 => ConsistencyStatus::Consistent,
        _ if score >= 0.5 => ConsistencyStatus::MinorDiscrepancies,
        _ => ConsistencyStatus::MajorDiscrepancies,
    };
    CrossPeriodResult {
        earlier_audit_id: earlier.id,
        later_audit_id: later.id,
        days_apart: (later.due_date - earlier.due_date).num_days(),
        consistency_score: score,
        status,
        issues: bounded_list(raw.get("issues"), ListLimits::default()),
        recommendation: text(raw.get("recommendation")),
    }
}

pub fn parse_cross_document(raw: &Value, target: &EvidenceDocument, other: &EvidenceDocument, similarity: f64) -> CrossDocumentResult {
    let score = raw.get("match_score").and_then(unit_interval).unwrap_or(0.0);
    let status = match label(raw, "status").as_str() {
        "matched" | "match" => MatchStatus::Matched,
        "partial_match" | "partial" => MatchStatus::PartialMatch,
        "mismatch" | "mismatched" | "no_match" => MatchStatus::Mismatch,
        _ if score >= 0.8 => MatchStatus::Matched,
        _ if score >= 0.5 => MatchStatus::PartialMatch,
        _ => MatchStatus::Mismatch,
    };
    CrossDocumentResult {
        document_id: target.id,
        other_document_id: other.id,
        other_document_name: other.logical_name.clone(),
        textual_similarity: round1(similarity * 100.0) / 100.0,
        match_score: score,
        status,
        discrepancies: bounded_list(raw.get("discrepancies"), ListLimits::default()),
        recommendation: text(raw.get("recommendation")),
    }
}

pub fn parse_narrative(raw: &Value, document_id: i64) -> NarrativeResult {
    let inconsistencies = raw
        .get("inconsistencies")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let description = text(item.get("description"));
                    if description.is_empty() {
                        return None;
                    }
                    Some(NarrativeInconsistency {
                        kind: text(item.get("type")).to_lowercase(),
                        description,
                        severity: item
                            .get("severity")
                            .and_then(|v| v.as_str())
                            .and_then(RiskLevel::from_alias)
                            .unwrap_or(RiskLevel::Medium),
                    })
                })
                .take(ListLimits::default().max_items)
                .collect()
        })
        .unwrap_or_default();
    NarrativeResult { document_id, inconsistencies, summary: text(raw.get("summary")) }
}

/// Consecutive audits (by due date) no more than the window apart, pairs
/// touching the target audit first.
pub fn period_pairs(audits: &[Audit], target_audit_id: i64) -> Vec<(&Audit, &Audit)> {
    let mut sorted: Vec<&Audit> = audits.iter().collect();
    sorted.sort_by_key(|a| (a.due_date, a.id));
    let mut pairs: Vec<(&Audit, &Audit)> = sorted
        .windows(2)
        .filter(|w| w[1].due_date - w[0].due_date <= Duration::days(PERIOD_WINDOW_DAYS))
        .map(|w| (w[0], w[1]))
        .collect();
    pairs.sort_by_key(|(a, b)| !(a.id == target_audit_id || b.id == target_audit_id));
    pairs.truncate(MAX_PERIOD_PAIRS);
    pairs
}

/// One row per physical file.
fn distinct_files(documents: Vec<EvidenceDocument>) -> Vec<EvidenceDocument> {
    let mut seen: Vec<(String, i64)> = Vec::new();
    documents
        .into_iter()
        .filter(|d| {
            let key = (d.stored_path.clone(), d.size);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}

impl SebiAuditor {
    /// Evidence quoted by earlier analyses, else the extracted text.
    async fn document_evidence(&self, document: &EvidenceDocument) -> String {
        let snippets: Vec<&str> = document
            .analyses
            .iter()
            .flat_map(|a| a.evidence_snippets.iter().map(String::as_str))
            .collect();
        let cap = self.extractor.cross_document_char_cap();
        if !snippets.is_empty() {
            return fit_to_cap(&snippets.join("\n"), cap);
        }
        match self.extractor.extract_for_comparison(&document.stored_path, &document.mime_type).await {
            Ok(text) => text,
            Err(e) => {
                debug!(document_id = document.id, error = %e, "No comparable evidence for document");
                String::new()
            }
        }
    }

    async fn audit_evidence(&self, tenant_id: i64, audit_id: i64) -> Result<String, AttestError> {
        let documents = distinct_files(self.db.list_documents_for_audit(tenant_id, audit_id)?);
        let mut parts = Vec::new();
        for doc in &documents {
            let evidence = self.document_evidence(doc).await;
            if !evidence.trim().is_empty() {
                parts.push(format!("[{}]\n{}", doc.logical_name, evidence));
            }
        }
        Ok(fit_to_cap(&parts.join("\n\n"), self.extractor.text_char_cap()))
    }
}

pub(crate) async fn analyze(
    auditor: &SebiAuditor,
    tenant_id: i64,
    scope: &SebiScope,
    document_id: Option<i64>,
) -> Result<AccuracyReport, AttestError> {
    let audit = &scope.audit;
    let db = auditor.db();

    let documents = distinct_files(db.list_documents_for_audit(tenant_id, audit.id)?);
    let target = match document_id {
        Some(id) => Some(
            documents
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .or(db.get_document(tenant_id, id)?.filter(|d| d.audit_id == audit.id))
                .ok_or_else(|| AttestError::NotFound(format!("document {} in audit {}", id, audit.id)))?,
        ),
        None => documents.first().cloned(),
    };

    // cross-period
    let audits = db.list_audits_for_framework(tenant_id, scope.framework.id)?;
    let mut cross_period = Vec::new();
    for (earlier, later) in period_pairs(&audits, audit.id) {
        let earlier_evidence = auditor.audit_evidence(tenant_id, earlier.id).await?;
        let later_evidence = auditor.audit_evidence(tenant_id, later.id).await?;
        if earlier_evidence.trim().is_empty() || later_evidence.trim().is_empty() {
            debug!(earlier = earlier.id, later = later.id, "Skipping period pair without evidence");
            continue;
        }
        let vars = PromptVariables::new()
            .set("FRAMEWORK_NAME", scope.framework.name.as_str())
            .set("EARLIER_TITLE", earlier.title.as_str())
            .set("EARLIER_DUE", earlier.due_date.format("%Y-%m-%d").to_string())
            .set("EARLIER_EVIDENCE", earlier_evidence)
            .set("LATER_TITLE", later.title.as_str())
            .set("LATER_DUE", later.due_date.format("%Y-%m-%d").to_string())
            .set("LATER_EVIDENCE", later_evidence);
        cross_period.push(match auditor.ask("sebi-cross-period", &vars, audit.id).await {
            Ok(raw) => Check::Done(parse_cross_period(&raw, earlier, later)),
            Err(e) => Check::failed(&e),
        });
    }

    // cross-document and narrative
    let mut cross_document = Vec::new();
    let mut narrative = None;
    if let Some(target) = &target {
        let target_evidence = auditor.document_evidence(target).await;
        let others = documents
            .iter()
            .filter(|d| d.id != target.id && d.stored_path != target.stored_path)
            .take(MAX_DOCUMENT_COMPARISONS);
        for other in others {
            let other_evidence = auditor.document_evidence(other).await;
            if target_evidence.trim().is_empty() || other_evidence.trim().is_empty() {
                continue;
            }
            let similarity = similarity_ratio(&target_evidence, &other_evidence);
            let vars = PromptVariables::new()
                .set("AUDIT_TITLE", audit.title.as_str())
                .set("SIMILARITY", format_percent(similarity))
                .set("DOCUMENT_A_NAME", target.logical_name.as_str())
                .set("DOCUMENT_A_EVIDENCE", target_evidence.as_str())
                .set("DOCUMENT_B_NAME", other.logical_name.as_str())
                .set("DOCUMENT_B_EVIDENCE", other_evidence);
            cross_document.push(match auditor.ask("sebi-cross-document", &vars, audit.id).await {
                Ok(raw) => Check::Done(parse_cross_document(&raw, target, other, similarity)),
                Err(e) => Check::failed(&e),
            });
        }

        narrative = Some(match auditor.extractor.extract_for_evaluation(&target.stored_path, &target.mime_type).await {
            Ok(text) => {
                let vars = PromptVariables::new()
                    .set("AUDIT_TITLE", audit.title.as_str())
                    .set("DOCUMENT_TEXT", text);
                match auditor.ask("sebi-narrative", &vars, audit.id).await {
                    Ok(raw) => Check::Done(parse_narrative(&raw, target.id)),
                    Err(e) => Check::failed(&e),
                }
            }
            Err(e) => Check::failed(&e),
        });
    }

    let period_done: Vec<&CrossPeriodResult> = cross_period.iter().filter_map(Check::done).collect();
    let document_done: Vec<&CrossDocumentResult> = cross_document.iter().filter_map(Check::done).collect();
    let narrative_done = narrative.as_ref().and_then(Check::done);

    let total_checks = period_done.len() + document_done.len() + usize::from(narrative_done.is_some());
    let issues_found = period_done.iter().filter(|r| r.has_issue()).count()
        + document_done.iter().filter(|r| r.has_issue()).count()
        + usize::from(narrative_done.is_some_and(|n| !n.inconsistencies.is_empty()));
    let accurate_checks = total_checks - issues_found;
    let accuracy_score = (total_checks > 0).then(|| round1(accurate_checks as f64 * 100.0 / total_checks as f64));

    Ok(AccuracyReport {
        audit_id: audit.id,
        framework_id: scope.framework.id,
        document_id: target.as_ref().map(|d| d.id),
        accuracy_score,
        accuracy_display: accuracy_score.map_or_else(|| "n/a".to_string(), |s| format!("{:.1}%", s)),
        total_checks,
        accurate_checks,
        issues_found,
        cross_period,
        cross_document,
        narrative,
        arithmetic_checks: Vec::new(),
        duplicate_disclosures: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use crate::models::{AuditStatus, AuditType};

    fn audit(id: i64, month: u32) -> Audit {
        let due = Utc.with_ymd_and_hms(2025, month, 1, 0, 0, 0).unwrap();
        Audit {
            id,
            tenant_id: 1,
            framework_id: 1,
            policy_id: None,
            sub_policy_id: None,
            title: format!("Filing {}", id),
            scope: None,
            objective: None,
            business_unit: None,
            audit_type: AuditType::External,
            status: AuditStatus::Completed,
            due_date: due,
            completion_date: None,
            filing_type: None,
            created_at: due,
        }
    }

    #[test]
    fn test_period_pairs_window_and_priority() {
        // Jan, Mar, Apr are close; Dec is more than 120 days after Apr
        let audits = vec![audit(1, 1), audit(2, 3), audit(3, 4), audit(4, 12)];
        let pairs = period_pairs(&audits, 3);
        let ids: Vec<(i64, i64)> = pairs.iter().map(|(a, b)| (a.id, b.id)).collect();
        assert_eq!(ids, vec![(2, 3), (1, 2)]);
    }

    #[test]
    fn test_cross_period_status_from_score_when_unlabelled() {
        let r = parse_cross_period(&json!({"consistency_score": 65, "issues": ["EPS restated"]}), &audit(1, 1), &audit(2, 3));
        assert_eq!(r.status, ConsistencyStatus::MinorDiscrepancies);
        assert_eq!(r.consistency_score, 0.65);
        assert_eq!(r.days_apart, 59);
        assert!(r.has_issue());
    }

    #[test]
    fn test_narrative_parsing_skips_empty_items() {
        let n = parse_narrative(
            &json!({"inconsistencies": [
                {"type": "Contradiction", "description": "Revenue up in one section, down in another", "severity": "high"},
                {"type": "terminology_drift", "description": ""}
            ], "summary": "One contradiction"}),
            7,
        );
        assert_eq!(n.inconsistencies.len(), 1);
        assert_eq!(n.inconsistencies[0].kind, "contradiction");
        assert_eq!(n.inconsistencies[0].severity, RiskLevel::High);
    }
}
