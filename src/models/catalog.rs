use serde::{Deserialize, Serialize};

/// A regulatory regime owned by a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framework {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub active: bool,
    /// Framework-level switch for the SEBI specialized auditor.
    pub sebi_ai_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub tenant_id: i64,
    pub framework_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPolicy {
    pub id: i64,
    pub tenant_id: i64,
    pub policy_id: i64,
    pub name: String,
}

/// A single testable clause, the unit of evaluation. Carries its full
/// position in the framework hierarchy so persistence can key on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRequirement {
    pub id: i64,
    pub tenant_id: i64,
    pub framework_id: i64,
    pub policy_id: i64,
    pub sub_policy_id: i64,
    pub title: String,
    /// Authoritative requirement text handed to the model.
    pub description: String,
    pub criticality: String,
    pub is_risk: bool,
    pub mitigation: Option<String>,
    pub possible_damage: Option<String>,
    pub mandatory: bool,
    pub ai_bse_enabled: bool,
}

impl ComplianceRequirement {
    pub fn is_critical(&self) -> bool {
        matches!(self.criticality.trim().to_lowercase().as_str(), "critical" | "high")
    }

    /// Weight of this requirement in document-level aggregation.
    pub fn aggregation_weight(&self) -> f64 {
        let base = if self.is_critical() { 2.0 } else { 1.0 };
        if self.is_risk { base + 1.0 } else { base }
    }
}

/// Catalog row as authored upstream; lifecycle columns drive requirement selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompliance {
    pub sub_policy_id: i64,
    pub title: String,
    pub description: String,
    #[serde(default = "default_criticality")]
    pub criticality: String,
    #[serde(default)]
    pub is_risk: bool,
    #[serde(default)]
    pub mitigation: Option<String>,
    #[serde(default)]
    pub possible_damage: Option<String>,
    #[serde(default = "default_true")]
    pub mandatory: bool,
    #[serde(default)]
    pub ai_bse_enabled: bool,
    #[serde(default = "default_permanent")]
    pub permanent_temporary: String,
    #[serde(default = "default_approved")]
    pub status: String,
    #[serde(default = "default_active")]
    pub active_inactive: String,
}

impl NewCompliance {
    pub fn new(sub_policy_id: i64, title: &str, description: &str) -> Self {
        Self {
            sub_policy_id,
            title: title.to_string(),
            description: description.to_string(),
            criticality: default_criticality(),
            is_risk: false,
            mitigation: None,
            possible_damage: None,
            mandatory: true,
            ai_bse_enabled: false,
            permanent_temporary: default_permanent(),
            status: default_approved(),
            active_inactive: default_active(),
        }
    }
}

fn default_criticality() -> String {
    "Medium".to_string()
}

fn default_true() -> bool {
    true
}

fn default_permanent() -> String {
    "Permanent".to_string()
}

fn default_approved() -> String {
    "Approved".to_string()
}

fn default_active() -> String {
    "Active".to_string()
}
