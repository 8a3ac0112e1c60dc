use chrono::Utc;
use rusqlite::params;
use crate::errors::AttestError;
use crate::models::{ComplianceStatus, CrossFrameworkMapping, RiskLevel};
use super::connection::parse_timestamp;
use super::Database;

impl Database {
    /// Upsert keyed by (document, compliance, framework); reruns update in place.
    pub fn upsert_mapping(&self, tenant_id: i64, mapping: &CrossFrameworkMapping) -> Result<(), AttestError> {
        let recommendations = serde_json::to_string(&mapping.recommendations)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cross_framework_mappings (tenant_id, document_id, compliance_id, framework_id, status, score, risk_level, recommendations, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT (tenant_id, document_id, compliance_id, framework_id) DO UPDATE SET \
             status = excluded.status, score = excluded.score, risk_level = excluded.risk_level, \
             recommendations = excluded.recommendations, updated_at = excluded.updated_at",
            params![
                tenant_id,
                mapping.document_id,
                mapping.compliance_id,
                mapping.framework_id,
                mapping.status.as_str(),
                mapping.score.clamp(0.0, 1.0),
                mapping.risk_level.as_str(),
                recommendations,
                Utc::now().to_rfc3339(),
            ],
        ).map_err(|e| AttestError::from_sqlite("Failed to upsert cross-framework mapping", e))?;
        Ok(())
    }

    pub fn get_mappings_for_document(&self, tenant_id: i64, document_id: i64) -> Result<Vec<CrossFrameworkMapping>, AttestError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, compliance_id, framework_id, status, score, risk_level, recommendations, updated_at FROM cross_framework_mappings \
             WHERE tenant_id = ?1 AND document_id = ?2 ORDER BY framework_id, compliance_id"
        ).map_err(|e| AttestError::from_sqlite("Query failed", e))?;

        let rows = stmt.query_map(params![tenant_id, document_id], |row| {
            let status: String = row.get(3)?;
            let risk_level: String = row.get(5)?;
            let recommendations: String = row.get(6)?;
            let updated_at: String = row.get(7)?;
            Ok(CrossFrameworkMapping {
                document_id: row.get(0)?,
                compliance_id: row.get(1)?,
                framework_id: row.get(2)?,
                status: ComplianceStatus::from_alias(&status).unwrap_or(ComplianceStatus::RequiresReview),
                score: row.get(4)?,
                risk_level: RiskLevel::from_alias(&risk_level).unwrap_or(RiskLevel::Medium),
                recommendations: serde_json::from_str(&recommendations).unwrap_or_default(),
                updated_at: parse_timestamp(&updated_at),
            })
        }).map_err(|e| AttestError::from_sqlite("Query error", e))?;

        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
        }
        Ok(mappings)
    }
}
