use serde::{Deserialize, Serialize};
use crate::evaluation::aggregate;
use crate::models::{ComplianceAnalysis, ComplianceRequirement, ComplianceStatus, Framework};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSummary {
    pub framework_id: i64,
    pub framework_name: String,
    pub requirements_checked: usize,
    pub compliant: usize,
    pub partially_compliant: usize,
    pub non_compliant: usize,
    pub requires_review: usize,
    pub overall_status: ComplianceStatus,
    pub confidence: f64,
    /// (compliant + 0.5 * partial) / total
    pub score: f64,
}

impl FrameworkSummary {
    pub fn from_analyses(
        framework: &Framework,
        requirements: &[ComplianceRequirement],
        analyses: &[ComplianceAnalysis],
    ) -> Self {
        let count = |status: ComplianceStatus| analyses.iter().filter(|a| a.status == status).count();
        let compliant = count(ComplianceStatus::Compliant);
        let partially_compliant = count(ComplianceStatus::PartiallyCompliant);
        let total = analyses.len();
        let agg = aggregate(analyses, requirements);
        let score = if total == 0 {
            0.0
        } else {
            (compliant as f64 + 0.5 * partially_compliant as f64) / total as f64
        };

        Self {
            framework_id: framework.id,
            framework_name: framework.name.clone(),
            requirements_checked: total,
            compliant,
            partially_compliant,
            non_compliant: count(ComplianceStatus::NonCompliant),
            requires_review: count(ComplianceStatus::RequiresReview),
            overall_status: agg.status,
            confidence: agg.confidence,
            score,
        }
    }
}
