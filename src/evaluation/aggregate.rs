use crate::models::{ComplianceAnalysis, ComplianceRequirement, ComplianceStatus};

/// Document-level status and confidence folded from per-requirement analyses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    pub status: ComplianceStatus,
    pub confidence: f64,
}

impl Aggregate {
    pub fn empty() -> Self {
        Self { status: ComplianceStatus::RequiresReview, confidence: 0.0 }
    }
}

/// A non-compliant verdict on a critical or risk-flagged requirement decides
/// the document. Otherwise the status with the most requirement weight wins,
/// ties going to the more conservative status.
pub fn aggregate(analyses: &[ComplianceAnalysis], requirements: &[ComplianceRequirement]) -> Aggregate {
    if analyses.is_empty() {
        return Aggregate::empty();
    }

    let requirement_for = |id: i64| requirements.iter().find(|r| r.id == id);

    let confidence = analyses.iter().map(|a| a.effective_confidence()).sum::<f64>() / analyses.len() as f64;
    let confidence = confidence.clamp(0.0, 1.0);

    let critical_failure = analyses.iter().any(|a| {
        a.status == ComplianceStatus::NonCompliant
            && requirement_for(a.compliance_id).is_some_and(|r| r.is_critical() || r.is_risk)
    });
    if critical_failure {
        return Aggregate { status: ComplianceStatus::NonCompliant, confidence };
    }

    let mut weights: Vec<(ComplianceStatus, f64)> = Vec::new();
    for analysis in analyses {
        let weight = requirement_for(analysis.compliance_id).map_or(1.0, |r| r.aggregation_weight());
        match weights.iter_mut().find(|(s, _)| *s == analysis.status) {
            Some((_, total)) => *total += weight,
            None => weights.push((analysis.status, weight)),
        }
    }

    let status = weights
        .into_iter()
        .max_by(|(sa, wa), (sb, wb)| {
            wa.partial_cmp(wb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| sb.conservatism_rank().cmp(&sa.conservatism_rank()))
        })
        .map(|(s, _)| s)
        .unwrap_or(ComplianceStatus::RequiresReview);

    Aggregate { status, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    fn req(id: i64, criticality: &str, is_risk: bool) -> ComplianceRequirement {
        ComplianceRequirement {
            id,
            tenant_id: 1,
            framework_id: 1,
            policy_id: 1,
            sub_policy_id: 1,
            title: format!("C{}", id),
            description: String::new(),
            criticality: criticality.into(),
            is_risk,
            mitigation: None,
            possible_damage: None,
            mandatory: true,
            ai_bse_enabled: false,
        }
    }

    fn analysis(id: i64, status: ComplianceStatus, confidence: Option<f64>) -> ComplianceAnalysis {
        ComplianceAnalysis {
            compliance_id: id,
            title: format!("C{}", id),
            status,
            score: status.default_score(),
            risk_level: RiskLevel::for_status(status),
            evidence_snippets: vec![],
            strengths: vec![],
            weaknesses: vec![],
            missing: vec![],
            recommendations: vec![],
            confidence,
            processing_note: None,
        }
    }

    #[test]
    fn test_empty_is_requires_review() {
        assert_eq!(aggregate(&[], &[]), Aggregate::empty());
    }

    #[test]
    fn test_critical_non_compliance_dominates() {
        let reqs = vec![req(1, "Low", false), req(2, "Low", false), req(3, "Critical", false)];
        let analyses = vec![
            analysis(1, ComplianceStatus::Compliant, Some(0.9)),
            analysis(2, ComplianceStatus::Compliant, Some(0.9)),
            analysis(3, ComplianceStatus::NonCompliant, Some(0.6)),
        ];
        let agg = aggregate(&analyses, &reqs);
        assert_eq!(agg.status, ComplianceStatus::NonCompliant);
        assert!((agg.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_plurality() {
        let reqs = vec![req(1, "Low", false), req(2, "Low", false), req(3, "High", true)];
        let analyses = vec![
            analysis(1, ComplianceStatus::Compliant, None),
            analysis(2, ComplianceStatus::Compliant, None),
            analysis(3, ComplianceStatus::PartiallyCompliant, None),
        ];
        // weights: compliant 2, partial 3
        assert_eq!(aggregate(&analyses, &reqs).status, ComplianceStatus::PartiallyCompliant);
    }

    #[test]
    fn test_tie_breaks_conservatively() {
        let reqs = vec![req(1, "Low", false), req(2, "Low", false), req(3, "Low", false)];
        let analyses = vec![
            analysis(1, ComplianceStatus::Compliant, None),
            analysis(2, ComplianceStatus::PartiallyCompliant, None),
            analysis(3, ComplianceStatus::NonCompliant, None),
        ];
        assert_eq!(aggregate(&analyses, &reqs).status, ComplianceStatus::NonCompliant);

        let analyses = vec![
            analysis(1, ComplianceStatus::Compliant, None),
            analysis(2, ComplianceStatus::RequiresReview, None),
        ];
        assert_eq!(aggregate(&analyses, &reqs).status, ComplianceStatus::RequiresReview);
    }

    #[test]
    fn test_confidence_falls_back_to_score() {
        let reqs = vec![req(1, "Low", false)];
        let agg = aggregate(&[analysis(1, ComplianceStatus::Compliant, None)], &reqs);
        assert_eq!(agg.confidence, 0.85);
    }
}
