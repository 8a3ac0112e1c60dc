//! Evidence ingestion: registers uploaded artifacts against an audit.

pub mod followup;

use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use crate::db::Database;
use crate::errors::AttestError;
use crate::extract::DocumentKind;
use crate::models::{ArtifactFacts, Audit, EvidenceMapping, ExternalSource, NewEvidence};

pub use followup::Followups;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub audit_id: i64,
    pub document_ids: Vec<i64>,
    /// Set when the upload matched an already-evaluated file.
    pub duplicate_of: Option<i64>,
    /// True when this upload moved the audit out of YetToStart.
    pub audit_started: bool,
    pub scheduled: Vec<String>,
}

#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    media_root: PathBuf,
    followups: Option<Followups>,
}

impl Ingestor {
    pub fn new(db: Database, media_root: impl Into<PathBuf>) -> Self {
        Self { db, media_root: media_root.into(), followups: None }
    }

    pub fn with_followups(mut self, followups: Followups) -> Self {
        self.followups = Some(followups);
        self
    }

    fn resolve_path(&self, stored_path: &str) -> PathBuf {
        let path = Path::new(stored_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    /// Register an artifact that is already in storage.
    pub async fn register(&self, tenant_id: i64, audit_id: i64, evidence: &NewEvidence) -> Result<UploadOutcome, AttestError> {
        validate_evidence(evidence)?;
        let audit = self.db.require_audit(tenant_id, audit_id)?;
        self.validate_mappings(tenant_id, &audit, &evidence.mappings)?;

        let facts = self.artifact_facts(evidence).await;
        let duplicate = match evidence.external_source {
            ExternalSource::Manual => self.db.find_completed_duplicate(
                tenant_id,
                audit_id,
                &evidence.logical_name,
                facts.size,
                facts.content_sha256.as_deref(),
            )?,
            _ => None,
        };

        let document_ids = self.db.insert_evidence(tenant_id, audit_id, evidence, &facts, duplicate.as_ref())?;
        let audit_started = self.db.mark_audit_in_progress(tenant_id, audit_id)?;
        info!(
            tenant_id,
            audit_id,
            rows = document_ids.len(),
            duplicate_of = ?duplicate.as_ref().map(|d| d.id),
            audit_started,
            "Evidence registered"
        );

        let mut outcome = UploadOutcome {
            audit_id,
            document_ids,
            duplicate_of: duplicate.map(|d| d.id),
            audit_started,
            scheduled: Vec::new(),
        };
        if outcome.duplicate_of.is_none() {
            if let (Some(followups), Some(&document_id)) = (&self.followups, outcome.document_ids.first()) {
                outcome.scheduled = followups.schedule(tenant_id, &audit, document_id);
            }
        }
        Ok(outcome)
    }

    /// Write the bytes under the media root, then register them.
    pub async fn store_and_register(
        &self,
        tenant_id: i64,
        audit_id: i64,
        file_name: &str,
        bytes: &[u8],
        mappings: Vec<EvidenceMapping>,
    ) -> Result<UploadOutcome, AttestError> {
        let name = sanitize_file_name(file_name)?;
        self.db.require_audit(tenant_id, audit_id)?;

        let relative = format!("tenant_{}/audit_{}/{}_{}", tenant_id, audit_id, uuid::Uuid::new_v4().simple(), name);
        let path = self.media_root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Stored uploaded artifact");

        let evidence = NewEvidence {
            logical_name: name,
            stored_path: relative,
            size: Some(bytes.len() as i64),
            mime_type: None,
            external_source: ExternalSource::Manual,
            external_id: None,
            mappings,
        };
        self.register(tenant_id, audit_id, &evidence).await
    }

    /// Size, MIME type and content hash. Unreadable files fall back to the
    /// declared size and carry no hash.
    async fn artifact_facts(&self, evidence: &NewEvidence) -> ArtifactFacts {
        let path = self.resolve_path(&evidence.stored_path);
        let mime_type = evidence
            .mime_type
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DocumentKind::guess_mime(&path).to_string());

        match tokio::fs::read(&path).await {
            Ok(bytes) => ArtifactFacts {
                size: bytes.len() as i64,
                mime_type,
                content_sha256: Some(hex::encode(Sha256::digest(&bytes))),
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Artifact not readable, using declared size");
                ArtifactFacts { size: evidence.size.unwrap_or(0), mime_type, content_sha256: None }
            }
        }
    }

    /// Every mapped requirement, sub-policy or policy must sit inside the
    /// audit's framework.
    fn validate_mappings(&self, tenant_id: i64, audit: &Audit, mappings: &[EvidenceMapping]) -> Result<(), AttestError> {
        for mapping in mappings {
            if let Some(compliance_id) = mapping.compliance_id {
                let requirement = self
                    .db
                    .get_requirement(tenant_id, compliance_id)?
                    .ok_or_else(|| AttestError::InvalidInput(format!("unknown compliance_id {}", compliance_id)))?;
                if requirement.framework_id != audit.framework_id {
                    return Err(AttestError::InvalidInput(format!(
                        "compliance {} is not part of framework {}",
                        compliance_id, audit.framework_id
                    )));
                }
                if mapping.sub_policy_id.is_some_and(|sp| sp != requirement.sub_policy_id)
                    || mapping.policy_id.is_some_and(|p| p != requirement.policy_id)
                {
                    return Err(AttestError::InvalidInput(format!(
                        "mapping for compliance {} names a different policy or sub-policy",
                        compliance_id
                    )));
                }
            } else if let Some(sub_policy_id) = mapping.sub_policy_id {
                let (policy_id, framework_id) = self
                    .db
                    .sub_policy_parents(tenant_id, sub_policy_id)?
                    .ok_or_else(|| AttestError::InvalidInput(format!("unknown sub_policy_id {}", sub_policy_id)))?;
                if framework_id != audit.framework_id || mapping.policy_id.is_some_and(|p| p != policy_id) {
                    return Err(AttestError::InvalidInput(format!(
                        "sub-policy {} is not part of framework {}",
                        sub_policy_id, audit.framework_id
                    )));
                }
            } else if let Some(policy_id) = mapping.policy_id {
                let framework_id = self
                    .db
                    .policy_framework(tenant_id, policy_id)?
                    .ok_or_else(|| AttestError::InvalidInput(format!("unknown policy_id {}", policy_id)))?;
                if framework_id != audit.framework_id {
                    return Err(AttestError::InvalidInput(format!(
                        "policy {} is not part of framework {}",
                        policy_id, audit.framework_id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_evidence(evidence: &NewEvidence) -> Result<(), AttestError> {
    if evidence.logical_name.trim().is_empty() {
        return Err(AttestError::InvalidInput("logical_name is required".into()));
    }
    if evidence.stored_path.trim().is_empty() {
        return Err(AttestError::InvalidInput("stored_path is required".into()));
    }
    if Path::new(&evidence.stored_path).components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(AttestError::InvalidInput("stored_path must not contain '..'".into()));
    }
    if evidence.external_source != ExternalSource::Manual && evidence.external_id.is_none() {
        return Err(AttestError::InvalidInput(format!(
            "external_id is required for source {}",
            evidence.external_source.as_str()
        )));
    }
    if evidence.size.is_some_and(|s| s < 0) {
        return Err(AttestError::InvalidInput("size must not be negative".into()));
    }
    Ok(())
}

fn sanitize_file_name(raw: &str) -> Result<String, AttestError> {
    let name = Path::new(raw.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AttestError::InvalidInput(format!("invalid file name: {:?}", raw)));
    }
    Ok(name)
}
