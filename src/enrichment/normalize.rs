use serde_json::{json, Value};
use crate::models::{
    AuditFinding, ComplianceAnalysis, ComplianceRequirement, ComplianceStatus, FindingCheck, MajorMinor, RiskLevel,
};
use crate::utils::truncation::truncate_chars;

const MAX_TEXT_CHARS: usize = 4000;

/// Check code implied by an analysis when the model gives none.
pub fn derived_check(analysis: &ComplianceAnalysis) -> FindingCheck {
    match analysis.status {
        ComplianceStatus::Compliant => FindingCheck::FullyCompliant,
        ComplianceStatus::PartiallyCompliant => FindingCheck::PartiallyCompliant,
        ComplianceStatus::NonCompliant | ComplianceStatus::RequiresReview => FindingCheck::NotCompliant,
    }
}

pub fn derived_major_minor(analysis: &ComplianceAnalysis) -> MajorMinor {
    if analysis.risk_level == RiskLevel::High || analysis.score < ComplianceStatus::PARTIAL_THRESHOLD {
        MajorMinor::Major
    } else {
        MajorMinor::Minor
    }
}

pub fn derived_severity(analysis: &ComplianceAnalysis) -> u8 {
    (10.0 * (1.0 - analysis.score.clamp(0.0, 1.0))).round() as u8
}

fn check_of(value: Option<&Value>) -> Option<FindingCheck> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|c| FindingCheck::from_code(&c.to_string())),
        Value::String(s) => FindingCheck::from_code(s).or_else(|| {
            let key = s.trim().to_lowercase().replace([' ', '-'], "_");
            if matches!(key.as_str(), "not_applicable" | "n/a" | "na") {
                return Some(FindingCheck::NotApplicable);
            }
            ComplianceStatus::from_alias(&key).map(|status| match status {
                ComplianceStatus::Compliant => FindingCheck::FullyCompliant,
                ComplianceStatus::PartiallyCompliant => FindingCheck::PartiallyCompliant,
                _ => FindingCheck::NotCompliant,
            })
        }),
        _ => None,
    }
}

/// Severity on a 0-10 scale. Values in [11, 100] are read as 0-100 and
/// divided down; anything else is clamped.
fn severity_of(value: Option<&Value>) -> Option<u8> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    let scaled = if (11.0..=100.0).contains(&n) { n / 10.0 } else { n };
    Some(scaled.round().clamp(0.0, 10.0) as u8)
}

fn text_of(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then(|| truncate_chars(&text, MAX_TEXT_CHARS).to_string())
}

/// JSON-typed columns: arrays and objects pass through, strings are parsed
/// when they hold JSON and wrapped otherwise.
fn json_of(value: Option<&Value>) -> Option<Value> {
    match value? {
        v @ (Value::Array(_) | Value::Object(_)) => Some(v.clone()),
        Value::String(s) if !s.trim().is_empty() => match serde_json::from_str::<Value>(s) {
            Ok(v @ (Value::Array(_) | Value::Object(_))) => Some(v),
            _ => Some(json!([s.trim()])),
        },
        _ => None,
    }
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join("; ")
    }
}

/// Finding built from the analysis alone.
pub fn fallback_finding(
    audit_id: i64,
    requirement: &ComplianceRequirement,
    analysis: &ComplianceAnalysis,
) -> AuditFinding {
    let summary = format!(
        "AI analysis: {} (score {:.2}, risk {}).",
        analysis.status,
        analysis.score,
        analysis.risk_level
    );
    let comments = match &analysis.processing_note {
        Some(note) => format!("{} {}", summary, note),
        None => summary,
    };
    let impact = requirement
        .possible_damage
        .clone()
        .unwrap_or_else(|| format!("{} risk to {} if the gap persists.", analysis.risk_level, requirement.title));
    let predictive_risks: Vec<Value> = analysis
        .weaknesses
        .iter()
        .chain(analysis.missing.iter())
        .map(|w| json!({"risk": w, "likelihood": analysis.risk_level.as_str()}))
        .collect();
    let corrective_actions: Vec<Value> = analysis
        .recommendations
        .iter()
        .map(|r| json!({"action": r}))
        .collect();

    AuditFinding {
        audit_id,
        compliance_id: requirement.id,
        check: derived_check(analysis),
        major_minor: derived_major_minor(analysis),
        severity_rating: derived_severity(analysis),
        comments,
        impact,
        recommendation: join_or(&analysis.recommendations, "Review the evidence manually."),
        how_to_verify: "Compare the quoted evidence with the requirement text and request supporting records.".into(),
        why_to_verify: format!("Requirement criticality is {}.", requirement.criticality),
        what_to_verify: requirement.title.clone(),
        underlying_cause: join_or(&analysis.weaknesses, "Not determined"),
        suggested_action_plan: requirement
            .mitigation
            .clone()
            .unwrap_or_else(|| join_or(&analysis.recommendations, "Not determined")),
        predictive_risks: Value::Array(predictive_risks),
        corrective_actions: Value::Array(corrective_actions),
        review_status: "pending_review".into(),
        checked_date: None,
    }
}

/// Merge model output over the fallback finding, coercing each field.
pub fn normalize_finding(
    raw: &Value,
    audit_id: i64,
    requirement: &ComplianceRequirement,
    analysis: &ComplianceAnalysis,
) -> AuditFinding {
    let base = fallback_finding(audit_id, requirement, analysis);

    let mut major_minor = raw
        .get("major_minor")
        .and_then(|v| v.as_str())
        .and_then(MajorMinor::parse)
        .unwrap_or(base.major_minor);
    if analysis.status == ComplianceStatus::NonCompliant && analysis.risk_level == RiskLevel::High {
        major_minor = MajorMinor::Major;
    }

    AuditFinding {
        check: check_of(raw.get("check")).unwrap_or(base.check),
        major_minor,
        severity_rating: severity_of(raw.get("severity_rating").or_else(|| raw.get("severity"))).unwrap_or(base.severity_rating),
        comments: text_of(raw.get("comments")).unwrap_or(base.comments),
        impact: text_of(raw.get("impact")).unwrap_or(base.impact),
        recommendation: text_of(raw.get("recommendation")).unwrap_or(base.recommendation),
        how_to_verify: text_of(raw.get("how_to_verify")).unwrap_or(base.how_to_verify),
        why_to_verify: text_of(raw.get("why_to_verify")).unwrap_or(base.why_to_verify),
        what_to_verify: text_of(raw.get("what_to_verify")).unwrap_or(base.what_to_verify),
        underlying_cause: text_of(raw.get("underlying_cause")).unwrap_or(base.underlying_cause),
        suggested_action_plan: text_of(raw.get("suggested_action_plan")).unwrap_or(base.suggested_action_plan),
        predictive_risks: json_of(raw.get("predictive_risks")).unwrap_or(base.predictive_risks),
        corrective_actions: json_of(raw.get("corrective_actions")).unwrap_or(base.corrective_actions),
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> ComplianceRequirement {
        ComplianceRequirement {
            id: 9,
            tenant_id: 1,
            framework_id: 1,
            policy_id: 1,
            sub_policy_id: 1,
            title: "Access reviews".into(),
            description: "Quarterly access reviews".into(),
            criticality: "High".into(),
            is_risk: true,
            mitigation: Some("Automate reviews".into()),
            possible_damage: None,
            mandatory: true,
            ai_bse_enabled: false,
        }
    }

    fn analysis(status: ComplianceStatus, score: f64, risk: RiskLevel) -> ComplianceAnalysis {
        ComplianceAnalysis {
            compliance_id: 9,
            title: "Access reviews".into(),
            status,
            score,
            risk_level: risk,
            evidence_snippets: vec![],
            strengths: vec![],
            weaknesses: vec!["No Q3 review".into()],
            missing: vec![],
            recommendations: vec!["Run the Q3 review".into()],
            confidence: Some(0.8),
            processing_note: None,
        }
    }

    #[test]
    fn test_fallback_derivations() {
        let f = fallback_finding(1, &req(), &analysis(ComplianceStatus::Compliant, 0.9, RiskLevel::Low));
        assert_eq!(f.check, FindingCheck::FullyCompliant);
        assert_eq!(f.major_minor, MajorMinor::Minor);
        assert_eq!(f.severity_rating, 1);

        let f = fallback_finding(1, &req(), &analysis(ComplianceStatus::PartiallyCompliant, 0.5, RiskLevel::High));
        assert_eq!(f.check, FindingCheck::PartiallyCompliant);
        assert_eq!(f.major_minor, MajorMinor::Major);
        assert_eq!(f.severity_rating, 5);
        assert_eq!(f.suggested_action_plan, "Automate reviews");
    }

    #[test]
    fn test_requires_review_maps_to_not_compliant() {
        let fb = ComplianceAnalysis::requires_review(9, "Access reviews", "LLM unavailable");
        let f = fallback_finding(1, &req(), &fb);
        assert_eq!(f.check, FindingCheck::NotCompliant);
        assert_eq!(f.severity_rating, 10);
        assert!(f.comments.contains("LLM unavailable"));
    }

    #[test]
    fn test_coercions() {
        let a = analysis(ComplianceStatus::PartiallyCompliant, 0.5, RiskLevel::Medium);
        let raw = json!({
            "check": "partially complied",
            "severity_rating": 65,
            "major_minor": "minor",
            "predictive_risks": "[{\"risk\": \"audit failure\"}]",
            "corrective_actions": "Hire an auditor",
            "comments": ["first", "second"]
        });
        let f = normalize_finding(&raw, 1, &req(), &a);
        assert_eq!(f.check, FindingCheck::PartiallyCompliant);
        assert_eq!(f.severity_rating, 7);
        assert_eq!(f.major_minor, MajorMinor::Minor);
        assert_eq!(f.predictive_risks[0]["risk"], "audit failure");
        assert_eq!(f.corrective_actions, json!(["Hire an auditor"]));
        assert_eq!(f.comments, "first; second");
        assert_eq!(f.review_status, "pending_review");
    }

    #[test]
    fn test_high_risk_non_compliance_forced_major() {
        let a = analysis(ComplianceStatus::NonCompliant, 0.2, RiskLevel::High);
        let f = normalize_finding(&json!({"major_minor": "minor", "check": 0}), 1, &req(), &a);
        assert_eq!(f.major_minor, MajorMinor::Major);
        assert_eq!(f.check, FindingCheck::NotCompliant);
        assert_eq!(f.severity_rating, 8);
    }

    #[test]
    fn test_not_applicable_and_out_of_range() {
        let a = analysis(ComplianceStatus::Compliant, 0.9, RiskLevel::Low);
        let f = normalize_finding(&json!({"check": "N/A", "severity_rating": -3}), 1, &req(), &a);
        assert_eq!(f.check, FindingCheck::NotApplicable);
        assert_eq!(f.severity_rating, 0);

        let f = normalize_finding(&json!({"severity_rating": 10.5}), 1, &req(), &a);
        assert_eq!(f.severity_rating, 10);
        let f = normalize_finding(&json!({"severity_rating": "11"}), 1, &req(), &a);
        assert_eq!(f.severity_rating, 1);
    }
}
