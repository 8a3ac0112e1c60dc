use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, Transaction};
use crate::errors::AttestError;
use crate::models::{
    ArtifactFacts, ComplianceAnalysis, ComplianceStatus, EvidenceDocument, EvidenceMapping,
    ExternalSource, NewEvidence, ProcessingState,
};
use super::connection::parse_timestamp;
use super::Database;

const EVIDENCE_COLUMNS: &str = "id, tenant_id, audit_id, logical_name, stored_path, size, mime_type, content_sha256, external_source, external_id, processing_state, policy_id, sub_policy_id, compliance_id, compliance_status, confidence, analysis_json, processing_note, uploaded_at, processed_at";

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<EvidenceDocument> {
    let external_source: String = row.get(8)?;
    let processing_state: String = row.get(10)?;
    let compliance_status: Option<String> = row.get(14)?;
    let analysis_json: Option<String> = row.get(16)?;
    let uploaded_at: String = row.get(18)?;
    let processed_at: Option<String> = row.get(19)?;

    let analyses: Vec<ComplianceAnalysis> = analysis_json
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    Ok(EvidenceDocument {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        audit_id: row.get(2)?,
        logical_name: row.get(3)?,
        stored_path: row.get(4)?,
        size: row.get(5)?,
        mime_type: row.get(6)?,
        content_sha256: row.get(7)?,
        external_source: ExternalSource::parse(&external_source).unwrap_or(ExternalSource::Manual),
        external_id: row.get(9)?,
        processing_state: ProcessingState::parse(&processing_state).unwrap_or(ProcessingState::Pending),
        mapping: EvidenceMapping {
            policy_id: row.get(11)?,
            sub_policy_id: row.get(12)?,
            compliance_id: row.get(13)?,
        },
        compliance_status: compliance_status.as_deref().and_then(ComplianceStatus::from_alias),
        confidence: row.get(15)?,
        analyses,
        processing_note: row.get(17)?,
        uploaded_at: parse_timestamp(&uploaded_at),
        processed_at: processed_at.as_deref().map(parse_timestamp),
    })
}

fn collect_documents(
    rows: rusqlite::MappedRows<'_, impl FnMut(&Row<'_>) -> rusqlite::Result<EvidenceDocument>>,
) -> Result<Vec<EvidenceDocument>, AttestError> {
    let mut documents = Vec::new();
    for row in rows {
        documents.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
    }
    Ok(documents)
}

/// Values copied onto new rows that duplicate an already-evaluated file.
struct Verdict<'a> {
    status: Option<&'a str>,
    confidence: Option<f64>,
    analysis_json: Option<String>,
    note: Option<String>,
}

fn insert_row(
    tx: &Transaction<'_>,
    tenant_id: i64,
    audit_id: i64,
    evidence: &NewEvidence,
    facts: &ArtifactFacts,
    mapping: &EvidenceMapping,
    verdict: &Verdict<'_>,
) -> Result<i64, AttestError> {
    let now = Utc::now().to_rfc3339();
    let state = if verdict.status.is_some() { ProcessingState::Completed } else { ProcessingState::Pending };
    let processed_at = verdict.status.map(|_| now.clone());

    // External rows are upserted on (audit, source, external id, compliance)
    if evidence.external_source != ExternalSource::Manual {
        if let Some(external_id) = evidence.external_id.as_deref() {
            let existing: Option<i64> = tx.query_row(
                "SELECT id FROM evidence_documents WHERE tenant_id = ?1 AND audit_id = ?2 AND external_source = ?3 AND external_id = ?4 AND compliance_id IS ?5",
                params![tenant_id, audit_id, evidence.external_source.as_str(), external_id, mapping.compliance_id],
                |r| r.get(0),
            ).optional().map_err(|e| AttestError::from_sqlite("Query error", e))?;

            if let Some(id) = existing {
                tx.execute(
                    "UPDATE evidence_documents SET logical_name = ?2, stored_path = ?3, size = ?4, mime_type = ?5, content_sha256 = ?6, policy_id = ?7, sub_policy_id = ?8, processing_state = ?9, compliance_status = ?10, confidence = ?11, analysis_json = ?12, processing_note = ?13, processed_at = ?14 WHERE id = ?1",
                    params![
                        id,
                        evidence.logical_name,
                        evidence.stored_path,
                        facts.size,
                        facts.mime_type,
                        facts.content_sha256,
                        mapping.policy_id,
                        mapping.sub_policy_id,
                        state.as_str(),
                        verdict.status,
                        verdict.confidence,
                        verdict.analysis_json,
                        verdict.note,
                        processed_at,
                    ],
                ).map_err(|e| AttestError::from_sqlite("Failed to update evidence row", e))?;
                return Ok(id);
            }
        }
    }

    tx.execute(
        "INSERT INTO evidence_documents (tenant_id, audit_id, logical_name, stored_path, size, mime_type, content_sha256, external_source, external_id, processing_state, policy_id, sub_policy_id, compliance_id, compliance_status, confidence, analysis_json, processing_note, uploaded_at, processed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            tenant_id,
            audit_id,
            evidence.logical_name,
            evidence.stored_path,
            facts.size,
            facts.mime_type,
            facts.content_sha256,
            evidence.external_source.as_str(),
            evidence.external_id,
            state.as_str(),
            mapping.policy_id,
            mapping.sub_policy_id,
            mapping.compliance_id,
            verdict.status,
            verdict.confidence,
            verdict.analysis_json,
            verdict.note,
            now,
            processed_at,
        ],
    ).map_err(|e| AttestError::from_sqlite("Failed to insert evidence row", e))?;
    Ok(tx.last_insert_rowid())
}

impl Database {
    /// Create one evidence row per mapping in a single transaction. When
    /// `duplicate_of` is given the rows are born completed with its verdict.
    pub fn insert_evidence(
        &self,
        tenant_id: i64,
        audit_id: i64,
        evidence: &NewEvidence,
        facts: &ArtifactFacts,
        duplicate_of: Option<&EvidenceDocument>,
    ) -> Result<Vec<i64>, AttestError> {
        let analysis_json = match duplicate_of {
            Some(doc) => Some(serde_json::to_string(&doc.analyses)?),
            None => None,
        };
        let verdict = Verdict {
            status: duplicate_of.and_then(|d| d.compliance_status).map(|s| s.as_str()),
            confidence: duplicate_of.and_then(|d| d.confidence),
            analysis_json,
            note: duplicate_of.map(|d| format!("Duplicate of evidence {}; evaluation skipped", d.id)),
        };
        let verdict = match (duplicate_of, verdict.status) {
            // A completed duplicate without a stored status still counts as reviewed
            (Some(_), None) => Verdict { status: Some(ComplianceStatus::RequiresReview.as_str()), ..verdict },
            _ => verdict,
        };

        let default_mapping = [EvidenceMapping::default()];
        let mappings: &[EvidenceMapping] = if evidence.mappings.is_empty() {
            &default_mapping
        } else {
            &evidence.mappings
        };

        self.with_transaction(|tx| {
            let mut ids = Vec::with_capacity(mappings.len());
            for mapping in mappings {
                ids.push(insert_row(tx, tenant_id, audit_id, evidence, facts, mapping, &verdict)?);
            }
            Ok(ids)
        })
    }

    pub fn get_document(&self, tenant_id: i64, document_id: i64) -> Result<Option<EvidenceDocument>, AttestError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM evidence_documents WHERE id = ?1 AND tenant_id = ?2", EVIDENCE_COLUMNS);
        conn.query_row(&sql, params![document_id, tenant_id], document_from_row)
            .optional()
            .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    /// Rows that describe the same physical upload as `document`.
    pub fn document_group(&self, document: &EvidenceDocument) -> Result<Vec<EvidenceDocument>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM evidence_documents WHERE tenant_id = ?1 AND audit_id = ?2 AND logical_name = ?3 AND size = ?4 AND stored_path = ?5 ORDER BY id",
            EVIDENCE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(
            params![document.tenant_id, document.audit_id, document.logical_name, document.size, document.stored_path],
            document_from_row,
        ).map_err(|e| AttestError::from_sqlite("Query error", e))?;
        collect_documents(rows)
    }

    pub fn list_documents_for_audit(&self, tenant_id: i64, audit_id: i64) -> Result<Vec<EvidenceDocument>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM evidence_documents WHERE tenant_id = ?1 AND audit_id = ?2 ORDER BY id",
            EVIDENCE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(params![tenant_id, audit_id], document_from_row)
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;
        collect_documents(rows)
    }

    /// A completed row in the same audit with equal name and size, and an
    /// equal content hash when both sides have one.
    pub fn find_completed_duplicate(
        &self,
        tenant_id: i64,
        audit_id: i64,
        logical_name: &str,
        size: i64,
        content_sha256: Option<&str>,
    ) -> Result<Option<EvidenceDocument>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM evidence_documents WHERE tenant_id = ?1 AND audit_id = ?2 AND logical_name = ?3 AND size = ?4 AND processing_state = 'completed' AND (?5 IS NULL OR content_sha256 IS NULL OR content_sha256 = ?5) ORDER BY id LIMIT 1",
            EVIDENCE_COLUMNS
        );
        conn.query_row(&sql, params![tenant_id, audit_id, logical_name, size, content_sha256], document_from_row)
            .optional()
            .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    pub fn set_documents_state(
        &self,
        tenant_id: i64,
        document_ids: &[i64],
        state: ProcessingState,
        note: Option<&str>,
    ) -> Result<usize, AttestError> {
        let conn = self.lock()?;
        let processed_at = matches!(state, ProcessingState::Completed | ProcessingState::Failed)
            .then(|| Utc::now().to_rfc3339());
        let mut affected = 0;
        for id in document_ids {
            affected += conn.execute(
                "UPDATE evidence_documents SET processing_state = ?3, processing_note = COALESCE(?4, processing_note), processed_at = COALESCE(?5, processed_at) WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id, state.as_str(), note, processed_at],
            ).map_err(|e| AttestError::from_sqlite("Failed to update evidence state", e))?;
        }
        Ok(affected)
    }

    /// Write the document-level verdict onto every row of the group.
    pub fn store_document_verdict(
        &self,
        tenant_id: i64,
        document_ids: &[i64],
        status: ComplianceStatus,
        confidence: f64,
        analyses: &[ComplianceAnalysis],
        note: Option<&str>,
    ) -> Result<usize, AttestError> {
        let analysis_json = serde_json::to_string(analyses)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        let mut affected = 0;
        for id in document_ids {
            affected += conn.execute(
                "UPDATE evidence_documents SET processing_state = 'completed', compliance_status = ?3, confidence = ?4, analysis_json = ?5, processing_note = ?6, processed_at = ?7 WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id, status.as_str(), confidence.clamp(0.0, 1.0), analysis_json, note, now],
            ).map_err(|e| AttestError::from_sqlite("Failed to store verdict", e))?;
        }
        Ok(affected)
    }
}
