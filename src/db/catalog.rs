use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use crate::errors::AttestError;
use crate::models::{ComplianceRequirement, Framework, NewCompliance};
use super::Database;

const REQUIREMENT_COLUMNS: &str = "c.id, c.tenant_id, p.framework_id, sp.policy_id, c.sub_policy_id, c.title, c.description, c.criticality, c.is_risk, c.mitigation, c.possible_damage, c.mandatory, c.ai_bse_enabled";

const REQUIREMENT_JOIN: &str = "FROM compliances c \
     JOIN sub_policies sp ON sp.id = c.sub_policy_id AND sp.tenant_id = c.tenant_id \
     JOIN policies p ON p.id = sp.policy_id AND p.tenant_id = c.tenant_id";

/// Only permanent, approved, active requirements are ever evaluated.
const SELECTABLE: &str = "c.permanent_temporary = 'Permanent' AND c.status = 'Approved' AND c.active_inactive = 'Active'";

fn requirement_from_row(row: &Row<'_>) -> rusqlite::Result<ComplianceRequirement> {
    Ok(ComplianceRequirement {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        framework_id: row.get(2)?,
        policy_id: row.get(3)?,
        sub_policy_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        criticality: row.get(7)?,
        is_risk: row.get::<_, i64>(8)? != 0,
        mitigation: row.get(9)?,
        possible_damage: row.get(10)?,
        mandatory: row.get::<_, i64>(11)? != 0,
        ai_bse_enabled: row.get::<_, i64>(12)? != 0,
    })
}

fn framework_from_row(row: &Row<'_>) -> rusqlite::Result<Framework> {
    Ok(Framework {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        active: row.get::<_, String>(3)? == "Active",
        sebi_ai_enabled: row.get::<_, i64>(4)? != 0,
    })
}

impl Database {
    pub fn insert_framework(&self, tenant_id: i64, name: &str, sebi_ai_enabled: bool) -> Result<i64, AttestError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO frameworks (tenant_id, name, status, sebi_ai_enabled, created_at) VALUES (?1, ?2, 'Active', ?3, ?4)",
            params![tenant_id, name, sebi_ai_enabled as i64, Utc::now().to_rfc3339()],
        ).map_err(|e| AttestError::from_sqlite("Failed to insert framework", e))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_framework_active(&self, tenant_id: i64, framework_id: i64, active: bool) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE frameworks SET status = ?3 WHERE id = ?1 AND tenant_id = ?2",
            params![framework_id, tenant_id, if active { "Active" } else { "Inactive" }],
        ).map_err(|e| AttestError::from_sqlite("Failed to update framework", e))?;
        Ok(affected > 0)
    }

    pub fn set_framework_sebi_enabled(&self, tenant_id: i64, framework_id: i64, enabled: bool) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE frameworks SET sebi_ai_enabled = ?3 WHERE id = ?1 AND tenant_id = ?2",
            params![framework_id, tenant_id, enabled as i64],
        ).map_err(|e| AttestError::from_sqlite("Failed to update framework", e))?;
        Ok(affected > 0)
    }

    pub fn insert_policy(&self, tenant_id: i64, framework_id: i64, name: &str) -> Result<i64, AttestError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO policies (tenant_id, framework_id, name) VALUES (?1, ?2, ?3)",
            params![tenant_id, framework_id, name],
        ).map_err(|e| AttestError::from_sqlite("Failed to insert policy", e))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_sub_policy(&self, tenant_id: i64, policy_id: i64, name: &str) -> Result<i64, AttestError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sub_policies (tenant_id, policy_id, name) VALUES (?1, ?2, ?3)",
            params![tenant_id, policy_id, name],
        ).map_err(|e| AttestError::from_sqlite("Failed to insert sub-policy", e))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_compliance(&self, tenant_id: i64, c: &NewCompliance) -> Result<i64, AttestError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO compliances (tenant_id, sub_policy_id, title, description, criticality, is_risk, mitigation, possible_damage, mandatory, ai_bse_enabled, permanent_temporary, status, active_inactive) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                tenant_id,
                c.sub_policy_id,
                c.title,
                c.description,
                c.criticality,
                c.is_risk as i64,
                c.mitigation,
                c.possible_damage,
                c.mandatory as i64,
                c.ai_bse_enabled as i64,
                c.permanent_temporary,
                c.status,
                c.active_inactive,
            ],
        ).map_err(|e| AttestError::from_sqlite("Failed to insert compliance", e))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_framework(&self, tenant_id: i64, framework_id: i64) -> Result<Option<Framework>, AttestError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, tenant_id, name, status, sebi_ai_enabled FROM frameworks WHERE id = ?1 AND tenant_id = ?2",
            params![framework_id, tenant_id],
            framework_from_row,
        )
        .optional()
        .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    pub fn list_active_frameworks(&self, tenant_id: i64) -> Result<Vec<Framework>, AttestError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, name, status, sebi_ai_enabled FROM frameworks WHERE tenant_id = ?1 AND status = 'Active' ORDER BY id"
        ).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(params![tenant_id], framework_from_row)
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;

        let mut frameworks = Vec::new();
        for row in rows {
            frameworks.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
        }
        Ok(frameworks)
    }

    /// True when any compliance under the framework carries the SEBI flag.
    pub fn framework_has_sebi_compliance(&self, tenant_id: i64, framework_id: i64) -> Result<bool, AttestError> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) {} WHERE c.tenant_id = ?1 AND p.framework_id = ?2 AND c.ai_bse_enabled = 1", REQUIREMENT_JOIN);
        let count: i64 = conn
            .query_row(&sql, params![tenant_id, framework_id], |r| r.get(0))
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;
        Ok(count > 0)
    }

    /// Look up a requirement regardless of lifecycle state (for titles in reports).
    pub fn get_requirement(&self, tenant_id: i64, compliance_id: i64) -> Result<Option<ComplianceRequirement>, AttestError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} {} WHERE c.tenant_id = ?1 AND c.id = ?2", REQUIREMENT_COLUMNS, REQUIREMENT_JOIN);
        conn.query_row(&sql, params![tenant_id, compliance_id], requirement_from_row)
            .optional()
            .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    /// Selectable requirements of `framework_id` among `ids`, in the caller's
    /// order. Ids from other frameworks are dropped.
    pub fn selectable_requirements_by_ids(
        &self,
        tenant_id: i64,
        framework_id: i64,
        ids: &[i64],
    ) -> Result<Vec<ComplianceRequirement>, AttestError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} {} WHERE c.tenant_id = ?1 AND p.framework_id = ?2 AND c.id = ?3 AND {}",
            REQUIREMENT_COLUMNS, REQUIREMENT_JOIN, SELECTABLE
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;

        let mut requirements = Vec::new();
        for id in ids {
            let found = stmt
                .query_row(params![tenant_id, framework_id, id], requirement_from_row)
                .optional()
                .map_err(|e| AttestError::from_sqlite("Query error", e))?;
            if let Some(req) = found {
                if !requirements.iter().any(|r: &ComplianceRequirement| r.id == req.id) {
                    requirements.push(req);
                }
            }
        }
        Ok(requirements)
    }

    pub fn selectable_requirements_for_sub_policy(
        &self,
        tenant_id: i64,
        framework_id: i64,
        sub_policy_id: i64,
    ) -> Result<Vec<ComplianceRequirement>, AttestError> {
        self.query_requirements(tenant_id, framework_id, Some(("c.sub_policy_id = ?3", sub_policy_id)))
    }

    pub fn selectable_requirements_for_policy(
        &self,
        tenant_id: i64,
        framework_id: i64,
        policy_id: i64,
    ) -> Result<Vec<ComplianceRequirement>, AttestError> {
        self.query_requirements(tenant_id, framework_id, Some(("sp.policy_id = ?3", policy_id)))
    }

    pub fn selectable_requirements_for_framework(&self, tenant_id: i64, framework_id: i64) -> Result<Vec<ComplianceRequirement>, AttestError> {
        self.query_requirements(tenant_id, framework_id, None)
    }

    fn query_requirements(
        &self,
        tenant_id: i64,
        framework_id: i64,
        narrow: Option<(&str, i64)>,
    ) -> Result<Vec<ComplianceRequirement>, AttestError> {
        let conn = self.lock()?;
        let mut values = vec![tenant_id, framework_id];
        let narrow_clause = match narrow {
            Some((clause, id)) => {
                values.push(id);
                format!(" AND {}", clause)
            }
            None => String::new(),
        };
        let sql = format!(
            "SELECT {} {} WHERE c.tenant_id = ?1 AND p.framework_id = ?2{} AND {} ORDER BY c.sub_policy_id, c.id",
            REQUIREMENT_COLUMNS, REQUIREMENT_JOIN, narrow_clause, SELECTABLE
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| AttestError::from_sqlite("Query failed", e))?;
        let rows = stmt.query_map(params_from_iter(values), requirement_from_row)
            .map_err(|e| AttestError::from_sqlite("Query error", e))?;

        let mut requirements = Vec::new();
        for row in rows {
            requirements.push(row.map_err(|e| AttestError::from_sqlite("Row error", e))?);
        }
        Ok(requirements)
    }

    /// Framework owning a policy.
    pub fn policy_framework(&self, tenant_id: i64, policy_id: i64) -> Result<Option<i64>, AttestError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT framework_id FROM policies WHERE id = ?1 AND tenant_id = ?2",
            params![policy_id, tenant_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| AttestError::from_sqlite("Query error", e))
    }

    /// (policy, framework) owning a sub-policy.
    pub fn sub_policy_parents(&self, tenant_id: i64, sub_policy_id: i64) -> Result<Option<(i64, i64)>, AttestError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT sp.policy_id, p.framework_id FROM sub_policies sp \
             JOIN policies p ON p.id = sp.policy_id AND p.tenant_id = sp.tenant_id \
             WHERE sp.id = ?1 AND sp.tenant_id = ?2",
            params![sub_policy_id, tenant_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(|e| AttestError::from_sqlite("Query error", e))
    }
}
