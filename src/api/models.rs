use serde::{Deserialize, Serialize};
use crate::models::EvidenceMapping;

/// Body of the compliance check endpoint. Empty means every mapped requirement.
#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub compliance_ids: Option<Vec<i64>>,
}

/// Query of the raw upload endpoint; the body is the file itself.
#[derive(Debug, Deserialize)]
pub struct RawUploadQuery {
    pub file_name: String,
    pub policy_id: Option<i64>,
    pub sub_policy_id: Option<i64>,
    pub compliance_id: Option<i64>,
}

impl RawUploadQuery {
    pub fn mappings(&self) -> Vec<EvidenceMapping> {
        vec![EvidenceMapping {
            policy_id: self.policy_id,
            sub_policy_id: self.sub_policy_id,
            compliance_id: self.compliance_id,
        }]
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccuracyQuery {
    pub document_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvidencePackQuery {
    pub use_case: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub audit_id: i64,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub audit_id: i64,
    pub deleted: bool,
    pub jobs_cancelled: bool,
}
