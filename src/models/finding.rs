use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit finding `check` column. Persisted as "0".."3".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCheck {
    NotCompliant,
    PartiallyCompliant,
    FullyCompliant,
    NotApplicable,
}

impl FindingCheck {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotCompliant => "0",
            Self::PartiallyCompliant => "1",
            Self::FullyCompliant => "2",
            Self::NotApplicable => "3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(Self::NotCompliant),
            "1" => Some(Self::PartiallyCompliant),
            "2" => Some(Self::FullyCompliant),
            "3" => Some(Self::NotApplicable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MajorMinor {
    Major,
    Minor,
}

impl MajorMinor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            _ => None,
        }
    }
}

/// Enriched, audit-scoped outcome for one requirement. Unique per (audit, compliance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub audit_id: i64,
    pub compliance_id: i64,
    pub check: FindingCheck,
    pub major_minor: MajorMinor,
    /// 0..=10
    pub severity_rating: u8,
    pub comments: String,
    pub impact: String,
    pub recommendation: String,
    pub how_to_verify: String,
    pub why_to_verify: String,
    pub what_to_verify: String,
    pub underlying_cause: String,
    pub suggested_action_plan: String,
    pub predictive_risks: serde_json::Value,
    pub corrective_actions: serde_json::Value,
    pub review_status: String,
    pub checked_date: Option<DateTime<Utc>>,
}
