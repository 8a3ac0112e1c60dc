use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest verdict for a requirement, keyed by its hierarchy position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistVerification {
    pub tenant_id: i64,
    pub compliance_id: i64,
    pub sub_policy_id: i64,
    pub policy_id: i64,
    pub framework_id: i64,
    /// 0 not complied, 1 partial, 2 complied.
    pub complied: u8,
    pub comments: String,
    pub verifier: String,
    pub verified_at: DateTime<Utc>,
    /// Number of successful evaluations folded into this row.
    pub count: i64,
}
