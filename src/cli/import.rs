//! `attest import`: load a YAML catalog of frameworks, their policy tree,
//! requirements and audits. Names are resolved within the file.

use std::path::Path;
use chrono::{DateTime, Utc};
use console::style;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::cli::commands::{GlobalArgs, ImportArgs};
use crate::db::Database;
use crate::errors::AttestError;
use crate::models::{AuditStatus, AuditType, NewAudit, NewCompliance};

#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub frameworks: Vec<CatalogFramework>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogFramework {
    pub name: String,
    #[serde(default)]
    pub sebi_ai_enabled: bool,
    #[serde(default)]
    pub policies: Vec<CatalogPolicy>,
    #[serde(default)]
    pub audits: Vec<CatalogAudit>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogPolicy {
    pub name: String,
    #[serde(default)]
    pub sub_policies: Vec<CatalogSubPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogSubPolicy {
    pub name: String,
    #[serde(default)]
    pub compliances: Vec<CatalogCompliance>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogCompliance {
    pub title: String,
    pub description: String,
    pub criticality: Option<String>,
    #[serde(default)]
    pub is_risk: bool,
    pub mitigation: Option<String>,
    pub possible_damage: Option<String>,
    pub mandatory: Option<bool>,
    #[serde(default)]
    pub ai_bse_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct CatalogAudit {
    pub title: String,
    pub due_date: DateTime<Utc>,
    /// Policy name within the same framework.
    pub policy: Option<String>,
    pub scope: Option<String>,
    pub objective: Option<String>,
    pub business_unit: Option<String>,
    pub audit_type: Option<AuditType>,
    pub status: Option<AuditStatus>,
    pub completion_date: Option<DateTime<Utc>>,
    pub filing_type: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub frameworks: usize,
    pub policies: usize,
    pub sub_policies: usize,
    pub compliances: usize,
    pub audits: usize,
}

pub fn parse_catalog(content: &str) -> Result<Catalog, AttestError> {
    let catalog: Catalog = serde_yaml::from_str(content)?;
    for fw in &catalog.frameworks {
        if fw.name.trim().is_empty() {
            return Err(AttestError::InvalidInput("framework name must not be empty".into()));
        }
        for audit in &fw.audits {
            if let Some(policy) = &audit.policy {
                if !fw.policies.iter().any(|p| &p.name == policy) {
                    return Err(AttestError::InvalidInput(format!(
                        "audit '{}' references unknown policy '{}' in framework '{}'",
                        audit.title, policy, fw.name
                    )));
                }
            }
        }
    }
    Ok(catalog)
}

pub fn import_catalog(db: &Database, tenant_id: i64, catalog: &Catalog) -> Result<ImportSummary, AttestError> {
    let mut summary = ImportSummary::default();
    for fw in &catalog.frameworks {
        let framework_id = db.insert_framework(tenant_id, &fw.name, fw.sebi_ai_enabled)?;
        summary.frameworks += 1;

        let mut policy_ids = Vec::with_capacity(fw.policies.len());
        for policy in &fw.policies {
            let policy_id = db.insert_policy(tenant_id, framework_id, &policy.name)?;
            policy_ids.push((policy.name.as_str(), policy_id));
            summary.policies += 1;

            for sub in &policy.sub_policies {
                let sub_policy_id = db.insert_sub_policy(tenant_id, policy_id, &sub.name)?;
                summary.sub_policies += 1;
                for c in &sub.compliances {
                    let mut record = NewCompliance::new(sub_policy_id, &c.title, &c.description);
                    if let Some(criticality) = &c.criticality {
                        record.criticality = criticality.clone();
                    }
                    record.is_risk = c.is_risk;
                    record.mitigation = c.mitigation.clone();
                    record.possible_damage = c.possible_damage.clone();
                    record.mandatory = c.mandatory.unwrap_or(true);
                    record.ai_bse_enabled = c.ai_bse_enabled;
                    db.insert_compliance(tenant_id, &record)?;
                    summary.compliances += 1;
                }
            }
        }

        for a in &fw.audits {
            let mut audit = NewAudit::new(framework_id, &a.title, a.due_date);
            audit.policy_id = a
                .policy
                .as_deref()
                .and_then(|name| policy_ids.iter().find(|(n, _)| *n == name).map(|(_, id)| *id));
            audit.scope = a.scope.clone();
            audit.objective = a.objective.clone();
            audit.business_unit = a.business_unit.clone();
            if let Some(kind) = a.audit_type {
                audit.audit_type = kind;
            }
            if let Some(status) = a.status {
                audit.status = status;
            }
            audit.completion_date = a.completion_date;
            audit.filing_type = a.filing_type.clone();
            db.insert_audit(tenant_id, &audit)?;
            summary.audits += 1;
        }
        info!(tenant_id, framework_id, framework = %fw.name, "Imported framework");
    }
    Ok(summary)
}

pub async fn handle_import(args: ImportArgs, global: &GlobalArgs) -> Result<(), AttestError> {
    let config = global.load_config().await?;
    let content = tokio::fs::read_to_string(Path::new(&args.file)).await?;
    let catalog = parse_catalog(&content)?;
    let db = Database::new(config.database.as_deref().unwrap_or(crate::api::DEFAULT_DB_PATH))?;
    let summary = import_catalog(&db, args.tenant, &catalog)?;
    println!(
        "{} {} frameworks, {} policies, {} sub-policies, {} compliances, {} audits",
        style("\u{2714} Imported").green().bold(),
        summary.frameworks,
        summary.policies,
        summary.sub_policies,
        summary.compliances,
        summary.audits,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
frameworks:
  - name: SEBI LODR
    sebi_ai_enabled: true
    policies:
      - name: Periodic disclosures
        sub_policies:
          - name: Financial results
            compliances:
              - title: Quarterly results filed
                description: Results are filed with the exchange within 45 days of quarter end.
                criticality: High
                is_risk: true
              - title: Board approval recorded
                description: Board minutes record approval of the results.
    audits:
      - title: Q4 FY25 financial results
        due_date: 2025-05-30T00:00:00Z
        policy: Periodic disclosures
        scope: Listed entity
        audit_type: External
"#;

    #[test]
    fn test_import_catalog() {
        let db = Database::in_memory().unwrap();
        let catalog = parse_catalog(CATALOG).unwrap();
        let summary = import_catalog(&db, 1, &catalog).unwrap();
        assert_eq!(
            summary,
            ImportSummary { frameworks: 1, policies: 1, sub_policies: 1, compliances: 2, audits: 1 }
        );

        let frameworks = db.list_active_frameworks(1).unwrap();
        assert_eq!(frameworks.len(), 1);
        assert!(frameworks[0].sebi_ai_enabled);
        let audits = db.list_audits_for_framework(1, frameworks[0].id).unwrap();
        assert_eq!(audits[0].audit_type, AuditType::External);
        assert!(audits[0].policy_id.is_some());
        assert_eq!(audits[0].status, AuditStatus::YetToStart);
    }

    #[test]
    fn test_unknown_policy_reference_rejected() {
        let bad = CATALOG.replace("policy: Periodic disclosures", "policy: Insider trading");
        assert!(matches!(parse_catalog(&bad), Err(AttestError::InvalidInput(_))));
    }
}
