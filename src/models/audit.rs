use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    YetToStart,
    WorkInProgress,
    Completed,
    Approved,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YetToStart => "YetToStart",
            Self::WorkInProgress => "WorkInProgress",
            Self::Completed => "Completed",
            Self::Approved => "Approved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().replace([' ', '_', '-'], "").to_lowercase().as_str() {
            "yettostart" => Some(Self::YetToStart),
            "workinprogress" | "inprogress" => Some(Self::WorkInProgress),
            "completed" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditType {
    Internal,
    External,
    #[serde(rename = "Self")]
    SelfAudit,
    #[serde(rename = "AI")]
    Ai,
    Regular,
}

impl AuditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "Internal",
            Self::External => "External",
            Self::SelfAudit => "Self",
            Self::Ai => "AI",
            Self::Regular => "Regular",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            "self" => Some(Self::SelfAudit),
            "ai" => Some(Self::Ai),
            "regular" => Some(Self::Regular),
            _ => None,
        }
    }
}

/// An audit over exactly one framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub id: i64,
    pub tenant_id: i64,
    pub framework_id: i64,
    pub policy_id: Option<i64>,
    pub sub_policy_id: Option<i64>,
    pub title: String,
    pub scope: Option<String>,
    pub objective: Option<String>,
    pub business_unit: Option<String>,
    pub audit_type: AuditType,
    pub status: AuditStatus,
    pub due_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    /// Explicit filing category; overrides title keyword matching for SLAs.
    pub filing_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register an audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAudit {
    pub framework_id: i64,
    #[serde(default)]
    pub policy_id: Option<i64>,
    #[serde(default)]
    pub sub_policy_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default = "default_audit_type")]
    pub audit_type: AuditType,
    #[serde(default = "default_audit_status")]
    pub status: AuditStatus,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filing_type: Option<String>,
}

impl NewAudit {
    pub fn new(framework_id: i64, title: &str, due_date: DateTime<Utc>) -> Self {
        Self {
            framework_id,
            policy_id: None,
            sub_policy_id: None,
            title: title.to_string(),
            scope: None,
            objective: None,
            business_unit: None,
            audit_type: default_audit_type(),
            status: default_audit_status(),
            due_date,
            completion_date: None,
            filing_type: None,
        }
    }
}

fn default_audit_type() -> AuditType {
    AuditType::Ai
}

fn default_audit_status() -> AuditStatus {
    AuditStatus::YetToStart
}
