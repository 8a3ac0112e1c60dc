use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use crate::errors::AttestError;
use crate::models::{AuditFinding, FindingCheck, MajorMinor};
use super::connection::parse_timestamp;
use super::Database;

const FINDING_COLUMNS: &str = "audit_id, compliance_id, check_status, major_minor, severity_rating, comments, impact, recommendation, how_to_verify, why_to_verify, what_to_verify, underlying_cause, suggested_action_plan, predictive_risks, corrective_actions, review_status, checked_date";

fn finding_from_row(row: &Row<'_>) -> rusqlite::Result<AuditFinding> {
    let check: String = row.get(2)?;
    let major_minor: String = row.get(3)?;
    let severity: String = row.get(4)?;
    let predictive_risks: String = row.get(13)?;
    let corrective_actions: String = row.get(14)?;
    let checked_date: Option<String> = row.get(16)?;

    Ok(AuditFinding {
        audit_id: row.get(0)?,
        compliance_id: row.get(1)?,
        check: FindingCheck::from_code(&check).unwrap_or(FindingCheck::NotCompliant),
        major_minor: MajorMinor::parse(&major_minor).unwrap_or(MajorMinor::Minor),
        severity_rating: severity.trim().parse::<u8>().unwrap_or(0).min(10),
        comments: row.get(5)?,
        impact: row.get(6)?,
        recommendation: row.get(7)?,
        how_to_verify: row.get(8)?,
        why_to_verify: row.get(9)?,
        what_to_verify: row.get(10)?,
        underlying_cause: row.get(11)?,
        suggested_action_plan: row.get(12)?,
        predictive_risks: serde_json::from_str(&predictive_risks).unwrap_or(serde_json::Value::Null),
        corrective_actions: serde_json::from_str(&corrective_actions).unwrap_or(serde_json::Value::Null),
        review_status: row.get(15)?,
        checked_date: checked_date.as_deref().map(parse_timestamp),
    })
}

impl Database {
    /// Insert or overwrite the finding for (audit, compliance). All enriched
    /// fields are replaced and the checked date moves to now.
    pub fn upsert_finding(&self, tenant_id: i64, finding: &AuditFinding) -> Result<(), AttestError> {
        let predictive_risks = serde_json::to_string(&finding.predictive_risks)?;
        let corrective_actions = serde_json::to_string(&finding.corrective_actions)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audit_findings (tenant_id, audit_id, compliance_id, check_status, major_minor, severity_rating, comments, impact, recommendation, how_to_verify, why_to_verify, what_to_verify, underlying_cause, suggested_action_plan, predictive_risks, corrective_actions, review_status, checked_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18) \
             ON CONFLICT (tenant_id, audit_id, compliance_id) DO UPDATE SET \
             check_status = excluded.check_status, major_minor = excluded.major_minor, severity_rating = excluded.severity_rating, \
             comments = excluded.comments, impact = excluded.impact, recommendation = excluded.recommendation, \
             how_to_verify = excluded.how_to_verify, why_to_verify = excluded.why_to_verify, what_to_verify = excluded.what_to_verify, \
             underlying_cause = excluded.underlying_cause, suggested_action_plan = excluded.suggested_action_plan, \
             predictive_risks = excluded.predictive_risks, corrective_actions = excluded.corrective_actions, \
             review_status = excluded.review_status, checked_date = excluded.checked_date",
            params![
                tenant_id,
                finding.audit_id,
                finding.compliance_id,
                finding.check.code(),
                finding.major_minor.as_str(),
                finding.severity_rating.min(10).to_string(),
                finding.comments,
                finding.impact,
                finding.recommendation,
                finding.how_to_verify,
                finding.why_to_verify,
                finding.what_to_verify,
                finding.underlying_cause,
                finding.suggested_action_plan,
                predictive_risks,
                corrective_actions,
                finding.review_status,
                Utc::now().to_rfc3339(),
            ],
        ).map_err(|e| AttestError::from_sqlite("Failed to upsert audit finding", e))?;
        Ok(())
    }

    pub fn get_finding(&self, tenant_id: i64, audit_id: i64, compliance_id: i64) -> Result<Option<AuditFinding>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM audit_findings WHERE tenant_id = ?1 AND audit_id = ?2 AND compliance_id = ?3",
            FINDING_COLUMNS
        );
        conn.query_row(&sql, params![tenant_id, audit_id, compliance_id], finding_from_row)
            .optional()
            .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    pub fn get_findings_for_audit(&self, tenant_id: i64, audit_id: i64) -> Result<Vec<AuditFinding>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM audit_findings WHERE tenant_id = ?1 AND audit_id = ?2 ORDER BY CAST(severity_rating AS INTEGER) DESC, compliance_id",
            FINDING_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(params![tenant_id, audit_id], finding_from_row)
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;

        let mut findings = Vec::new();
        for row in rows {
            findings.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
        }
        Ok(findings)
    }

    /// Findings across every audit of a framework, used by the SEBI analyses.
    pub fn get_findings_for_framework(&self, tenant_id: i64, framework_id: i64) -> Result<Vec<AuditFinding>, AttestError> {
        let conn = self.lock()?;
        let columns: Vec<String> = FINDING_COLUMNS.split(", ").map(|c| format!("f.{}", c)).collect();
        let sql = format!(
            "SELECT {} FROM audit_findings f JOIN audits a ON a.id = f.audit_id AND a.tenant_id = f.tenant_id \
             WHERE f.tenant_id = ?1 AND a.framework_id = ?2 ORDER BY f.audit_id, f.compliance_id",
            columns.join(", ")
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(params![tenant_id, framework_id], finding_from_row)
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;

        let mut findings = Vec::new();
        for row in rows {
            findings.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
        }
        Ok(findings)
    }
}
