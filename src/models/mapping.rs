use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::analysis::{ComplianceStatus, RiskLevel};

/// Verdict for one document against a requirement of a non-primary framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossFrameworkMapping {
    pub document_id: i64,
    pub compliance_id: i64,
    pub framework_id: i64,
    pub status: ComplianceStatus,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub updated_at: DateTime<Utc>,
}
