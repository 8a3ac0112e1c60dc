//! The single boundary where model JSON becomes typed analyses.

use serde_json::Value;
use tracing::{debug, warn};
use crate::config::EvaluationSettings;
use crate::errors::AttestError;
use crate::models::{ComplianceAnalysis, ComplianceRequirement, ComplianceStatus, RiskLevel};
use crate::utils::truncation::truncate_chars;

/// Bounds applied to every list stored with an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub max_items: usize,
    pub max_item_chars: usize,
}

impl ListLimits {
    pub fn from_settings(settings: &EvaluationSettings) -> Self {
        Self { max_items: settings.max_list_items, max_item_chars: settings.max_item_chars }
    }
}

impl Default for ListLimits {
    fn default() -> Self {
        Self { max_items: 10, max_item_chars: 2048 }
    }
}

/// Coerce a number, numeric string or percentage into [0, 1]. A `%` suffix
/// or a value in [2, 100] is read as a percentage; anything else is clamped.
pub fn unit_interval(value: &Value) -> Option<f64> {
    let (n, percent) = match value {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_suffix('%');
            (digits.unwrap_or(s).trim().parse::<f64>().ok()?, digits.is_some())
        }
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    let scaled = if percent || (2.0..=100.0).contains(&n) { n / 100.0 } else { n };
    Some(scaled.clamp(0.0, 1.0))
}

/// A list of strings from an array, a single string, or nothing.
pub fn bounded_list(value: Option<&Value>, limits: ListLimits) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter(|s| !s.is_empty())
        .take(limits.max_items)
        .map(|s| truncate_chars(&s, limits.max_item_chars).to_string())
        .collect()
}

fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| !v.is_null())
}

/// Canonical status from `compliance_status` or `status`. Unknown labels are
/// logged and become `RequiresReview`.
fn status_of(raw: &Value, compliance_id: i64) -> ComplianceStatus {
    let Some(label) = first_present(raw, &["compliance_status", "status"]).and_then(|v| v.as_str()) else {
        return ComplianceStatus::RequiresReview;
    };
    ComplianceStatus::from_alias(label).unwrap_or_else(|| {
        warn!(compliance_id, label, "Unknown compliance status from model, treating as requires_review");
        ComplianceStatus::RequiresReview
    })
}

/// Turn one raw element of `compliance_analyses` into a typed analysis.
pub fn normalize_analysis(raw: &Value, requirement: &ComplianceRequirement, limits: ListLimits) -> ComplianceAnalysis {
    let status = status_of(raw, requirement.id);
    let score = first_present(raw, &["score", "compliance_score"])
        .and_then(unit_interval)
        .unwrap_or_else(|| status.default_score());
    let risk_level = first_present(raw, &["risk_level", "risk"])
        .and_then(|v| v.as_str())
        .and_then(RiskLevel::from_alias)
        .unwrap_or_else(|| RiskLevel::for_status(status));
    let confidence = raw.get("confidence").and_then(unit_interval);

    ComplianceAnalysis {
        compliance_id: requirement.id,
        title: requirement.title.clone(),
        status,
        score,
        risk_level,
        evidence_snippets: bounded_list(first_present(raw, &["evidence_snippets", "evidence", "evidence_quotes"]), limits),
        strengths: bounded_list(raw.get("strengths"), limits),
        weaknesses: bounded_list(first_present(raw, &["weaknesses", "gaps"]), limits),
        missing: bounded_list(first_present(raw, &["missing", "missing_elements"]), limits),
        recommendations: bounded_list(raw.get("recommendations"), limits),
        confidence,
        processing_note: None,
    }
}

fn element_id(element: &Value) -> Option<i64> {
    match element.get("compliance_id").or_else(|| element.get("id"))? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Match the model's analyses to the requested batch. Elements are matched
/// by id first, then by position; ids outside the batch are ignored and
/// requirements without an element get the review fallback.
pub fn parse_batch_response(
    response: &Value,
    batch: &[ComplianceRequirement],
    limits: ListLimits,
) -> Result<Vec<ComplianceAnalysis>, AttestError> {
    let elements: Vec<&Value> = match first_present(response, &["compliance_analyses", "analyses"]) {
        Some(Value::Array(arr)) => arr.iter().filter(|v| v.is_object()).collect(),
        Some(_) => return Err(AttestError::LLMParseFailed("compliance_analyses is not an array".into())),
        None if batch.len() == 1 && (response.get("compliance_status").is_some() || response.get("status").is_some()) => {
            vec![response]
        }
        None => return Err(AttestError::LLMParseFailed("response has no compliance_analyses".into())),
    };

    let batch_ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
    let mut by_id: Vec<(i64, &Value)> = Vec::new();
    let mut positional: Vec<&Value> = Vec::new();
    for element in elements {
        match element_id(element) {
            Some(id) if batch_ids.contains(&id) => {
                if !by_id.iter().any(|(seen, _)| *seen == id) {
                    by_id.push((id, element));
                }
            }
            Some(id) => debug!(compliance_id = id, "Ignoring analysis for a requirement outside the batch"),
            None => positional.push(element),
        }
    }

    let mut positional = positional.into_iter();
    let analyses = batch
        .iter()
        .map(|req| {
            let element = by_id
                .iter()
                .find(|(id, _)| *id == req.id)
                .map(|(_, v)| *v)
                .or_else(|| positional.next());
            match element {
                Some(raw) => normalize_analysis(raw, req, limits),
                None => {
                    warn!(compliance_id = req.id, "Model returned no analysis for requirement");
                    ComplianceAnalysis::requires_review(req.id, &req.title, "Model returned no analysis for this requirement")
                }
            }
        })
        .collect();
    Ok(analyses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(id: i64) -> ComplianceRequirement {
        ComplianceRequirement {
            id,
            tenant_id: 1,
            framework_id: 1,
            policy_id: 1,
            sub_policy_id: 1,
            title: format!("C{}", id),
            description: "desc".into(),
            criticality: "Medium".into(),
            is_risk: false,
            mitigation: None,
            possible_damage: None,
            mandatory: true,
            ai_bse_enabled: false,
        }
    }

    #[test]
    fn test_score_scales_and_clamps() {
        assert_eq!(unit_interval(&json!(85)), Some(0.85));
        assert_eq!(unit_interval(&json!("70%")), Some(0.7));
        assert_eq!(unit_interval(&json!(0.3)), Some(0.3));
        assert_eq!(unit_interval(&json!(-2)), Some(0.0));
        assert_eq!(unit_interval(&json!(250)), Some(1.0));
        assert_eq!(unit_interval(&json!("high")), None);
    }

    #[test]
    fn test_score_just_above_one_is_clamped() {
        assert_eq!(unit_interval(&json!(1.5)), Some(1.0));
        assert_eq!(unit_interval(&json!(1.0)), Some(1.0));
        assert_eq!(unit_interval(&json!(2)), Some(0.02));
        assert_eq!(unit_interval(&json!("1.5%")), Some(0.015));
    }

    #[test]
    fn test_missing_score_derives_from_status() {
        let a = normalize_analysis(&json!({"status": "COMPLIED"}), &req(1), ListLimits::default());
        assert_eq!(a.status, ComplianceStatus::Compliant);
        assert_eq!(a.score, 0.85);
        assert_eq!(a.risk_level, RiskLevel::Low);
        assert_eq!(a.confidence, None);
    }

    #[test]
    fn test_missing_keys_are_neutral() {
        let a = normalize_analysis(&json!({}), &req(1), ListLimits::default());
        assert_eq!(a.status, ComplianceStatus::RequiresReview);
        assert_eq!(a.score, 0.0);
        assert!(a.evidence_snippets.is_empty());
    }

    #[test]
    fn test_unknown_status_becomes_requires_review() {
        let a = normalize_analysis(&json!({"compliance_status": "banana", "score": 0.9}), &req(1), ListLimits::default());
        assert_eq!(a.status, ComplianceStatus::RequiresReview);
        assert_eq!(a.score, 0.9);
    }

    #[test]
    fn test_lists_are_bounded() {
        let many: Vec<String> = (0..25).map(|i| format!("item {}", i)).collect();
        let raw = json!({"status": "partial", "strengths": many, "weaknesses": "single gap", "missing": ["x".repeat(5000)]});
        let a = normalize_analysis(&raw, &req(1), ListLimits::default());
        assert_eq!(a.strengths.len(), 10);
        assert_eq!(a.weaknesses, vec!["single gap".to_string()]);
        assert_eq!(a.missing[0].chars().count(), 2048);
    }

    #[test]
    fn test_match_by_id_then_position() {
        let batch = vec![req(1), req(2), req(3)];
        let response = json!({"compliance_analyses": [
            {"compliance_id": "3", "status": "non_compliant"},
            {"compliance_id": 99, "status": "compliant"},
            {"status": "compliant"},
            {"status": "partial"}
        ]});
        let analyses = parse_batch_response(&response, &batch, ListLimits::default()).unwrap();
        assert_eq!(analyses.len(), 3);
        assert_eq!(analyses[0].status, ComplianceStatus::Compliant);
        assert_eq!(analyses[1].status, ComplianceStatus::PartiallyCompliant);
        assert_eq!(analyses[2].status, ComplianceStatus::NonCompliant);
        assert_eq!(analyses[2].compliance_id, 3);
    }

    #[test]
    fn test_short_response_falls_back_for_missing() {
        let batch = vec![req(1), req(2)];
        let response = json!({"compliance_analyses": [{"compliance_id": 1, "status": "compliant", "score": 0.9}]});
        let analyses = parse_batch_response(&response, &batch, ListLimits::default()).unwrap();
        assert_eq!(analyses[0].status, ComplianceStatus::Compliant);
        assert!(analyses[1].is_fallback());
    }

    #[test]
    fn test_wrong_shape_is_parse_error() {
        let batch = vec![req(1), req(2)];
        assert!(matches!(
            parse_batch_response(&json!({"result": "ok"}), &batch, ListLimits::default()),
            Err(AttestError::LLMParseFailed(_))
        ));
        assert!(parse_batch_response(&json!({"compliance_analyses": "none"}), &batch, ListLimits::default()).is_err());
    }

    #[test]
    fn test_single_requirement_bare_object_accepted() {
        let analyses = parse_batch_response(&json!({"status": "compliant", "score": 0.8}), &[req(5)], ListLimits::default()).unwrap();
        assert_eq!(analyses[0].compliance_id, 5);
        assert_eq!(analyses[0].score, 0.8);
    }
}
