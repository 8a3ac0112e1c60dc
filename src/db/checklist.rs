use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use crate::errors::AttestError;
use crate::models::{ChecklistVerification, ComplianceRequirement};
use super::connection::parse_timestamp;
use super::Database;

impl Database {
    /// Record the latest verdict for a requirement. Each call is one successful
    /// evaluation, so an existing row has its `count` bumped by exactly one.
    pub fn upsert_checklist(
        &self,
        tenant_id: i64,
        requirement: &ComplianceRequirement,
        complied: u8,
        comments: &str,
        verifier: &str,
    ) -> Result<(), AttestError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checklist_verifications (tenant_id, compliance_id, sub_policy_id, policy_id, framework_id, complied, comments, verifier, verified_at, count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1) \
             ON CONFLICT (tenant_id, compliance_id, sub_policy_id, policy_id, framework_id) DO UPDATE SET \
             complied = excluded.complied, comments = excluded.comments, verifier = excluded.verifier, \
             verified_at = excluded.verified_at, count = checklist_verifications.count + 1",
            params![
                tenant_id,
                requirement.id,
                requirement.sub_policy_id,
                requirement.policy_id,
                requirement.framework_id,
                complied.min(2).to_string(),
                comments,
                verifier,
                Utc::now().to_rfc3339(),
            ],
        ).map_err(|e| AttestError::from_sqlite("Failed to upsert checklist verification", e))?;
        Ok(())
    }

    pub fn get_checklist(&self, tenant_id: i64, requirement: &ComplianceRequirement) -> Result<Option<ChecklistVerification>, AttestError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT tenant_id, compliance_id, sub_policy_id, policy_id, framework_id, complied, comments, verifier, verified_at, count FROM checklist_verifications \
             WHERE tenant_id = ?1 AND compliance_id = ?2 AND sub_policy_id = ?3 AND policy_id = ?4 AND framework_id = ?5",
            params![tenant_id, requirement.id, requirement.sub_policy_id, requirement.policy_id, requirement.framework_id],
            |row| {
                let complied: String = row.get(5)?;
                let verified_at: String = row.get(8)?;
                Ok(ChecklistVerification {
                    tenant_id: row.get(0)?,
                    compliance_id: row.get(1)?,
                    sub_policy_id: row.get(2)?,
                    policy_id: row.get(3)?,
                    framework_id: row.get(4)?,
                    complied: complied.trim().parse().unwrap_or(0),
                    comments: row.get(6)?,
                    verifier: row.get(7)?,
                    verified_at: parse_timestamp(&verified_at),
                    count: row.get(9)?,
                })
            },
        )
        .optional()
        .map_err(|e| AttestError::from_sqlite("Query error", e))
    }
}
