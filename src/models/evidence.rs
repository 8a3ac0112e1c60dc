use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::analysis::{ComplianceAnalysis, ComplianceStatus};

/// Where an evidence row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSource {
    Manual,
    EvidenceAttachment,
    DatabaseRecord,
}

impl ExternalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::EvidenceAttachment => "evidence_attachment",
            Self::DatabaseRecord => "database_record",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "evidence_attachment" => Some(Self::EvidenceAttachment),
            "database_record" => Some(Self::DatabaseRecord),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Link between an uploaded artifact and a spot in the framework hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceMapping {
    #[serde(default)]
    pub policy_id: Option<i64>,
    #[serde(default)]
    pub sub_policy_id: Option<i64>,
    #[serde(default)]
    pub compliance_id: Option<i64>,
}

/// One evidence row. A single physical file mapped to several requirements
/// appears as several rows sharing `logical_name` and `size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub id: i64,
    pub tenant_id: i64,
    pub audit_id: i64,
    pub logical_name: String,
    pub stored_path: String,
    pub size: i64,
    pub mime_type: String,
    pub content_sha256: Option<String>,
    pub external_source: ExternalSource,
    pub external_id: Option<String>,
    pub processing_state: ProcessingState,
    pub mapping: EvidenceMapping,
    pub compliance_status: Option<ComplianceStatus>,
    pub confidence: Option<f64>,
    pub analyses: Vec<ComplianceAnalysis>,
    pub processing_note: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Description of an already-stored artifact being attached to an audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvidence {
    pub logical_name: String,
    pub stored_path: String,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default = "default_source")]
    pub external_source: ExternalSource,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub mappings: Vec<EvidenceMapping>,
}

fn default_source() -> ExternalSource {
    ExternalSource::Manual
}

/// File facts resolved at ingestion time and written on every row of the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFacts {
    pub size: i64,
    pub mime_type: String,
    pub content_sha256: Option<String>,
}

/// Outcome of evaluating one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVerdict {
    pub document_id: i64,
    pub audit_id: i64,
    pub processing_state: ProcessingState,
    pub compliance_status: ComplianceStatus,
    pub confidence: f64,
    pub analyses: Vec<ComplianceAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DocumentVerdict {
    pub fn failed(document_id: i64, audit_id: i64, message: &str) -> Self {
        Self {
            document_id,
            audit_id,
            processing_state: ProcessingState::Failed,
            compliance_status: ComplianceStatus::RequiresReview,
            confidence: 0.0,
            analyses: Vec::new(),
            message: Some(message.to_string()),
        }
    }
}
