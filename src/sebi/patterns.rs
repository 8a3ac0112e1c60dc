use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use crate::errors::AttestError;
use crate::evaluation::normalize::{bounded_list, ListLimits};
use crate::models::{Audit, AuditFinding, RiskLevel};
use crate::prompts::PromptVariables;
use crate::utils::truncation::truncate_with_ellipsis;
use super::signals::ExternalSignals;
use super::{placeholder, Check, SebiAuditor, SebiScope, CORRECTION_RE};

pub const LAST_DAY_THRESHOLD: usize = 3;
pub const RECURRING_EDIT_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct LastDayAssessment {
    pub risk_level: RiskLevel,
    pub compliance_culture_score: u8,
    pub observations: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditAssessment {
    pub control_weakness: bool,
    pub weakness_level: RiskLevel,
    pub root_causes: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternFinding<T> {
    pub detected: bool,
    pub count: usize,
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Check<T>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub audit_id: i64,
    pub framework_id: i64,
    pub patterns_detected: usize,
    pub pattern_types: Vec<&'static str>,
    pub last_day_filings: PatternFinding<LastDayAssessment>,
    pub recurring_disclosure_edits: PatternFinding<EditAssessment>,
    pub event_silence: Value,
    pub promoter_trades: Value,
}

/// Filed within a day either side of the due date.
pub fn is_last_day_filing(audit: &Audit) -> bool {
    audit.completion_date.is_some_and(|done| {
        done >= audit.due_date - Duration::days(1) && done <= audit.due_date + Duration::days(1)
    })
}

pub fn correction_findings(findings: &[AuditFinding]) -> Vec<&AuditFinding> {
    findings.iter().filter(|f| CORRECTION_RE.is_match(&f.comments)).collect()
}

fn level(value: Option<&Value>, fallback: RiskLevel) -> RiskLevel {
    value.and_then(|v| v.as_str()).and_then(RiskLevel::from_alias).unwrap_or(fallback)
}

fn text(value: Option<&Value>) -> String {
    value.and_then(|v| v.as_str()).unwrap_or_default().trim().to_string()
}

pub fn parse_last_day(raw: &Value) -> LastDayAssessment {
    let score = raw
        .get("compliance_culture_score")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .unwrap_or(50.0)
        .clamp(0.0, 100.0);
    LastDayAssessment {
        risk_level: level(raw.get("risk_level"), RiskLevel::Medium),
        compliance_culture_score: score.round() as u8,
        observations: bounded_list(raw.get("observations"), ListLimits::default()),
        recommendation: text(raw.get("recommendation")),
    }
}

pub fn parse_edits(raw: &Value) -> EditAssessment {
    let control_weakness = match raw.get("control_weakness") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    };
    EditAssessment {
        control_weakness,
        weakness_level: level(raw.get("weakness_level"), if control_weakness { RiskLevel::Medium } else { RiskLevel::Low }),
        root_causes: bounded_list(raw.get("root_causes"), ListLimits::default()),
        recommendation: text(raw.get("recommendation")),
    }
}

pub(crate) async fn analyze(
    auditor: &SebiAuditor,
    tenant_id: i64,
    scope: &SebiScope,
    signals: &ExternalSignals,
) -> Result<PatternReport, AttestError> {
    let db = auditor.db();
    let audits = db.list_audits_for_framework(tenant_id, scope.framework.id)?;
    let findings = db.get_findings_for_framework(tenant_id, scope.framework.id)?;
    let audit_id = scope.audit.id;

    let last_day: Vec<&Audit> = audits.iter().filter(|a| is_last_day_filing(a)).collect();
    let last_day_items: Vec<String> = last_day
        .iter()
        .map(|a| {
            format!(
                "{} (due {}, filed {})",
                a.title,
                a.due_date.format("%Y-%m-%d"),
                a.completion_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
            )
        })
        .collect();
    let mut last_day_filings = PatternFinding {
        detected: last_day.len() >= LAST_DAY_THRESHOLD,
        count: last_day.len(),
        items: last_day_items,
        assessment: None,
    };
    if last_day_filings.detected {
        let filed = audits.iter().filter(|a| a.completion_date.is_some()).count();
        let vars = PromptVariables::new()
            .set("FILINGS", last_day_filings.items.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>().join("\n"))
            .set("TOTAL_FILINGS", filed.to_string());
        last_day_filings.assessment = Some(match auditor.ask("sebi-last-day", &vars, audit_id).await {
            Ok(raw) => Check::Done(parse_last_day(&raw)),
            Err(e) => Check::failed(&e),
        });
    }

    let edits = correction_findings(&findings);
    let edit_items: Vec<String> = edits
        .iter()
        .map(|f| {
            format!(
                "audit {} / compliance {}: {}",
                f.audit_id,
                f.compliance_id,
                truncate_with_ellipsis(&f.comments, 300)
            )
        })
        .collect();
    let mut recurring_disclosure_edits = PatternFinding {
        detected: edits.len() >= RECURRING_EDIT_THRESHOLD,
        count: edits.len(),
        items: edit_items,
        assessment: None,
    };
    if recurring_disclosure_edits.detected {
        let vars = PromptVariables::new().set(
            "EDITS",
            recurring_disclosure_edits.items.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>().join("\n"),
        );
        recurring_disclosure_edits.assessment = Some(match auditor.ask("sebi-recurring-edits", &vars, audit_id).await {
            Ok(raw) => Check::Done(parse_edits(&raw)),
            Err(e) => Check::failed(&e),
        });
    }

    let event_silence = match &signals.event_silence {
        Some(events) => serde_json::json!({"status": "external", "events": events}),
        None => placeholder("event silence versus price spike"),
    };
    let promoter_trades = match &signals.promoter_trades {
        Some(trades) => serde_json::json!({"status": "external", "trades": trades}),
        None => placeholder("promoter trades around disclosures"),
    };

    let mut pattern_types = Vec::new();
    if last_day_filings.detected {
        pattern_types.push("frequent_last_day_filings");
    }
    if recurring_disclosure_edits.detected {
        pattern_types.push("recurring_disclosure_edits");
    }
    if signals.event_silence.as_ref().is_some_and(|e| !e.is_empty()) {
        pattern_types.push("event_silence");
    }
    if signals.promoter_trades.as_ref().is_some_and(|t| !t.is_empty()) {
        pattern_types.push("promoter_trades");
    }

    Ok(PatternReport {
        audit_id,
        framework_id: scope.framework.id,
        patterns_detected: pattern_types.len(),
        pattern_types,
        last_day_filings,
        recurring_disclosure_edits,
        event_silence,
        promoter_trades,
    })
}
