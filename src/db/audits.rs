use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use crate::errors::AttestError;
use crate::models::{Audit, AuditStatus, AuditType, NewAudit};
use super::connection::parse_timestamp;
use super::Database;

const AUDIT_COLUMNS: &str = "id, tenant_id, framework_id, policy_id, sub_policy_id, title, scope, objective, business_unit, audit_type, status, due_date, completion_date, filing_type, created_at";

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<Audit> {
    let audit_type: String = row.get(9)?;
    let status: String = row.get(10)?;
    let due_date: String = row.get(11)?;
    let completion_date: Option<String> = row.get(12)?;
    let created_at: String = row.get(14)?;

    Ok(Audit {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        framework_id: row.get(2)?,
        policy_id: row.get(3)?,
        sub_policy_id: row.get(4)?,
        title: row.get(5)?,
        scope: row.get(6)?,
        objective: row.get(7)?,
        business_unit: row.get(8)?,
        audit_type: AuditType::parse(&audit_type).unwrap_or(AuditType::Ai),
        status: AuditStatus::parse(&status).unwrap_or(AuditStatus::YetToStart),
        due_date: parse_timestamp(&due_date),
        completion_date: completion_date.as_deref().map(parse_timestamp),
        filing_type: row.get(13)?,
        created_at: parse_timestamp(&created_at),
    })
}

impl Database {
    pub fn insert_audit(&self, tenant_id: i64, audit: &NewAudit) -> Result<i64, AttestError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audits (tenant_id, framework_id, policy_id, sub_policy_id, title, scope, objective, business_unit, audit_type, status, due_date, completion_date, filing_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                tenant_id,
                audit.framework_id,
                audit.policy_id,
                audit.sub_policy_id,
                audit.title,
                audit.scope,
                audit.objective,
                audit.business_unit,
                audit.audit_type.as_str(),
                audit.status.as_str(),
                audit.due_date.to_rfc3339(),
                audit.completion_date.map(|d| d.to_rfc3339()),
                audit.filing_type,
                Utc::now().to_rfc3339(),
            ],
        ).map_err(|e| AttestError::from_sqlite("Failed to insert audit", e))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_audit(&self, tenant_id: i64, audit_id: i64) -> Result<Option<Audit>, AttestError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM audits WHERE id = ?1 AND tenant_id = ?2", AUDIT_COLUMNS);
        conn.query_row(&sql, params![audit_id, tenant_id], audit_from_row)
            .optional()
            .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    /// Like `get_audit`, but a missing audit is an error.
    pub fn require_audit(&self, tenant_id: i64, audit_id: i64) -> Result<Audit, AttestError> {
        self.get_audit(tenant_id, audit_id)?
            .ok_or_else(|| AttestError::NotFound(format!("audit {} not found", audit_id)))
    }

    /// Audits of a framework, oldest due date first.
    pub fn list_audits_for_framework(&self, tenant_id: i64, framework_id: i64) -> Result<Vec<Audit>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM audits WHERE tenant_id = ?1 AND framework_id = ?2 ORDER BY due_date, id",
            AUDIT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(params![tenant_id, framework_id], audit_from_row)
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;

        let mut audits = Vec::new();
        for row in rows {
            audits.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
        }
        Ok(audits)
    }

    pub fn update_audit_status(&self, tenant_id: i64, audit_id: i64, status: AuditStatus) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE audits SET status = ?3 WHERE id = ?1 AND tenant_id = ?2",
            params![audit_id, tenant_id, status.as_str()],
        ).map_err(|e| AttestError::from_sqlite("Failed to update audit status", e))?;
        Ok(affected > 0)
    }

    /// YetToStart -> WorkInProgress. Returns true only when the transition happened.
    pub fn mark_audit_in_progress(&self, tenant_id: i64, audit_id: i64) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE audits SET status = 'WorkInProgress' WHERE id = ?1 AND tenant_id = ?2 AND status = 'YetToStart'",
            params![audit_id, tenant_id],
        ).map_err(|e| AttestError::from_sqlite("Failed to update audit status", e))?;
        Ok(affected > 0)
    }

    pub fn complete_audit(&self, tenant_id: i64, audit_id: i64, completed_at: DateTime<Utc>) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE audits SET status = 'Completed', completion_date = ?3 WHERE id = ?1 AND tenant_id = ?2 AND status != 'Approved'",
            params![audit_id, tenant_id, completed_at.to_rfc3339()],
        ).map_err(|e| AttestError::from_sqlite("Failed to complete audit", e))?;
        Ok(affected > 0)
    }

    /// Complete the audit when every finding has a non-zero check and the
    /// given document finished processing. Returns true when it completed.
    pub fn complete_audit_if_satisfied(&self, tenant_id: i64, audit_id: i64, document_id: i64) -> Result<bool, AttestError> {
        let satisfied = {
            let conn = self.lock()?;
            let (total, failing): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN check_status = '0' THEN 1 ELSE 0 END), 0) FROM audit_findings WHERE tenant_id = ?1 AND audit_id = ?2",
                params![tenant_id, audit_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            ).map_err(|e| AttestError::from_sqlite("Query error", e))?;
            let document_state: Option<String> = conn.query_row(
                "SELECT processing_state FROM evidence_documents WHERE id = ?1 AND tenant_id = ?2 AND audit_id = ?3",
                params![document_id, tenant_id, audit_id],
                |r| r.get(0),
            ).optional().map_err(|e| AttestError::from_sqlite("Query error", e))?;

            total > 0 && failing == 0 && document_state.as_deref() == Some("completed")
        };

        if !satisfied {
            return Ok(false);
        }
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE audits SET status = 'Completed', completion_date = ?3 WHERE id = ?1 AND tenant_id = ?2 AND status IN ('YetToStart', 'WorkInProgress')",
            params![audit_id, tenant_id, Utc::now().to_rfc3339()],
        ).map_err(|e| AttestError::from_sqlite("Failed to complete audit", e))?;
        Ok(affected > 0)
    }

    /// Cascades to evidence rows, findings and cross-framework mappings.
    pub fn delete_audit(&self, tenant_id: i64, audit_id: i64) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM audits WHERE id = ?1 AND tenant_id = ?2",
            params![audit_id, tenant_id],
        ).map_err(|e| AttestError::from_sqlite("Failed to delete audit", e))?;
        Ok(affected > 0)
    }

    pub fn count_evidence_for_audit(&self, tenant_id: i64, audit_id: i64) -> Result<i64, AttestError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM evidence_documents WHERE tenant_id = ?1 AND audit_id = ?2",
            params![tenant_id, audit_id],
            |r| r.get(0),
        ).map_err(|e| AttestError::from_sqlite("Query error", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn framework(db: &Database) -> i64 {
        db.insert_framework(1, "SEBI LODR", true).unwrap()
    }

    #[test]
    fn test_insert_and_get_audit() {
        let db = Database::in_memory().unwrap();
        let fw = framework(&db);
        let due = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut new = NewAudit::new(fw, "Q1 Financial Results", due);
        new.filing_type = Some("financial_results".into());
        let id = db.insert_audit(1, &new).unwrap();

        let audit = db.get_audit(1, id).unwrap().unwrap();
        assert_eq!(audit.title, "Q1 Financial Results");
        assert_eq!(audit.due_date, due);
        assert_eq!(audit.status, AuditStatus::YetToStart);
        assert_eq!(audit.audit_type, AuditType::Ai);
        assert_eq!(audit.filing_type.as_deref(), Some("financial_results"));
        assert!(db.get_audit(2, id).unwrap().is_none());
    }

    #[test]
    fn test_in_progress_transition_only_from_yet_to_start() {
        let db = Database::in_memory().unwrap();
        let fw = framework(&db);
        let id = db.insert_audit(1, &NewAudit::new(fw, "A", Utc::now())).unwrap();

        assert!(db.mark_audit_in_progress(1, id).unwrap());
        assert!(!db.mark_audit_in_progress(1, id).unwrap());
        db.update_audit_status(1, id, AuditStatus::Completed).unwrap();
        assert!(!db.mark_audit_in_progress(1, id).unwrap());
        assert_eq!(db.get_audit(1, id).unwrap().unwrap().status, AuditStatus::Completed);
    }

    #[test]
    fn test_complete_audit_sets_completion_date() {
        let db = Database::in_memory().unwrap();
        let fw = framework(&db);
        let id = db.insert_audit(1, &NewAudit::new(fw, "A", Utc::now())).unwrap();
        let when = Utc.with_ymd_and_hms(2025, 2, 20, 0, 0, 0).unwrap();

        assert!(db.complete_audit(1, id, when).unwrap());
        let audit = db.get_audit(1, id).unwrap().unwrap();
        assert_eq!(audit.status, AuditStatus::Completed);
        assert_eq!(audit.completion_date, Some(when));
    }

    #[test]
    fn test_delete_audit_is_tenant_scoped() {
        let db = Database::in_memory().unwrap();
        let fw = framework(&db);
        let id = db.insert_audit(1, &NewAudit::new(fw, "A", Utc::now())).unwrap();

        assert!(!db.delete_audit(2, id).unwrap());
        assert!(db.delete_audit(1, id).unwrap());
        assert!(db.require_audit(1, id).is_err());
    }

    #[test]
    fn test_list_audits_orders_by_due_date() {
        let db = Database::in_memory().unwrap();
        let fw = framework(&db);
        let late = db.insert_audit(1, &NewAudit::new(fw, "Later", Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())).unwrap();
        let early = db.insert_audit(1, &NewAudit::new(fw, "Earlier", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())).unwrap();

        let ids: Vec<i64> = db.list_audits_for_framework(1, fw).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![early, late]);
    }
}
