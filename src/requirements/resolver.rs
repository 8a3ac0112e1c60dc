use tracing::debug;
use crate::db::Database;
use crate::errors::AttestError;
use crate::models::{Audit, ComplianceRequirement, EvidenceMapping};

/// Where in the framework hierarchy to look for requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementScope {
    pub framework_id: i64,
    pub policy_id: Option<i64>,
    pub sub_policy_id: Option<i64>,
    pub compliance_ids: Option<Vec<i64>>,
}

impl RequirementScope {
    pub fn framework(framework_id: i64) -> Self {
        Self { framework_id, ..Default::default() }
    }

    pub fn for_audit(audit: &Audit) -> Self {
        Self {
            framework_id: audit.framework_id,
            policy_id: audit.policy_id,
            sub_policy_id: audit.sub_policy_id,
            compliance_ids: None,
        }
    }
}

/// Enumerates the active, approved, permanent requirements in scope.
#[derive(Clone)]
pub struct RequirementResolver {
    db: Database,
}

impl RequirementResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Priority: explicit ids, then sub-policy, then policy, then framework.
    /// Every branch is confined to `scope.framework_id`.
    pub fn resolve(&self, tenant_id: i64, scope: &RequirementScope) -> Result<Vec<ComplianceRequirement>, AttestError> {
        let requirements = if let Some(ids) = scope.compliance_ids.as_deref().filter(|ids| !ids.is_empty()) {
            self.db.selectable_requirements_by_ids(tenant_id, scope.framework_id, ids)?
        } else if let Some(sub_policy_id) = scope.sub_policy_id {
            self.db.selectable_requirements_for_sub_policy(tenant_id, scope.framework_id, sub_policy_id)?
        } else if let Some(policy_id) = scope.policy_id {
            self.db.selectable_requirements_for_policy(tenant_id, scope.framework_id, policy_id)?
        } else {
            self.db.selectable_requirements_for_framework(tenant_id, scope.framework_id)?
        };

        debug!(
            tenant_id,
            framework_id = scope.framework_id,
            count = requirements.len(),
            "Resolved requirements"
        );
        Ok(requirements)
    }

    /// Requirements for a document: caller-supplied ids win, then the union of
    /// the document's mappings, then the audit's own scope.
    pub fn resolve_for_document(
        &self,
        tenant_id: i64,
        audit: &Audit,
        mappings: &[EvidenceMapping],
        explicit_ids: Option<&[i64]>,
    ) -> Result<Vec<ComplianceRequirement>, AttestError> {
        if let Some(ids) = explicit_ids.filter(|ids| !ids.is_empty()) {
            let scope = RequirementScope { compliance_ids: Some(ids.to_vec()), ..RequirementScope::for_audit(audit) };
            return self.resolve(tenant_id, &scope);
        }

        let mut collected: Vec<ComplianceRequirement> = Vec::new();
        let mut any_mapping = false;
        for mapping in mappings {
            if mapping.compliance_id.is_none() && mapping.sub_policy_id.is_none() && mapping.policy_id.is_none() {
                continue;
            }
            any_mapping = true;
            let scope = RequirementScope {
                framework_id: audit.framework_id,
                policy_id: mapping.policy_id,
                sub_policy_id: mapping.sub_policy_id,
                compliance_ids: mapping.compliance_id.map(|id| vec![id]),
            };
            for req in self.resolve(tenant_id, &scope)? {
                if !collected.iter().any(|r| r.id == req.id) {
                    collected.push(req);
                }
            }
        }

        if any_mapping {
            Ok(collected)
        } else {
            self.resolve(tenant_id, &RequirementScope::for_audit(audit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::{NewAudit, NewCompliance};

    struct Catalog {
        db: Database,
        framework: i64,
        policy_a: i64,
        sub_a1: i64,
        c1: i64,
        c2: i64,
        c3: i64,
    }

    fn catalog() -> Catalog {
        let db = Database::in_memory().unwrap();
        let framework = db.insert_framework(1, "F1", false).unwrap();
        let policy_a = db.insert_policy(1, framework, "A").unwrap();
        let policy_b = db.insert_policy(1, framework, "B").unwrap();
        let sub_a1 = db.insert_sub_policy(1, policy_a, "A1").unwrap();
        let sub_a2 = db.insert_sub_policy(1, policy_a, "A2").unwrap();
        let sub_b1 = db.insert_sub_policy(1, policy_b, "B1").unwrap();
        let c1 = db.insert_compliance(1, &NewCompliance::new(sub_a1, "C1", "one")).unwrap();
        let c2 = db.insert_compliance(1, &NewCompliance::new(sub_a2, "C2", "two")).unwrap();
        let c3 = db.insert_compliance(1, &NewCompliance::new(sub_b1, "C3", "three")).unwrap();
        Catalog { db, framework, policy_a, sub_a1, c1, c2, c3 }
    }

    fn ids(reqs: &[ComplianceRequirement]) -> Vec<i64> {
        reqs.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_selection_priority() {
        let c = catalog();
        let resolver = RequirementResolver::new(c.db.clone());

        let all = resolver.resolve(1, &RequirementScope::framework(c.framework)).unwrap();
        assert_eq!(ids(&all), vec![c.c1, c.c2, c.c3]);

        let by_policy = RequirementScope { policy_id: Some(c.policy_a), ..RequirementScope::framework(c.framework) };
        assert_eq!(ids(&resolver.resolve(1, &by_policy).unwrap()), vec![c.c1, c.c2]);

        let by_sub = RequirementScope { sub_policy_id: Some(c.sub_a1), ..by_policy.clone() };
        assert_eq!(ids(&resolver.resolve(1, &by_sub).unwrap()), vec![c.c1]);

        let explicit = RequirementScope { compliance_ids: Some(vec![c.c3]), ..by_sub };
        assert_eq!(ids(&resolver.resolve(1, &explicit).unwrap()), vec![c.c3]);
    }

    #[test]
    fn test_other_tenant_sees_nothing() {
        let c = catalog();
        let resolver = RequirementResolver::new(c.db.clone());
        assert!(resolver.resolve(2, &RequirementScope::framework(c.framework)).unwrap().is_empty());
    }

    #[test]
    fn test_document_mappings_union_then_audit_fallback() {
        let c = catalog();
        let resolver = RequirementResolver::new(c.db.clone());
        let audit_id = c.db.insert_audit(1, &NewAudit::new(c.framework, "Audit", Utc::now())).unwrap();
        let audit = c.db.get_audit(1, audit_id).unwrap().unwrap();

        let mappings = vec![
            EvidenceMapping { compliance_id: Some(c.c3), ..Default::default() },
            EvidenceMapping { sub_policy_id: Some(c.sub_a1), ..Default::default() },
            EvidenceMapping { compliance_id: Some(c.c3), ..Default::default() },
        ];
        let reqs = resolver.resolve_for_document(1, &audit, &mappings, None).unwrap();
        assert_eq!(ids(&reqs), vec![c.c3, c.c1]);

        let fallback = resolver.resolve_for_document(1, &audit, &[EvidenceMapping::default()], None).unwrap();
        assert_eq!(fallback.len(), 3);

        let explicit = resolver.resolve_for_document(1, &audit, &mappings, Some(&[c.c2])).unwrap();
        assert_eq!(ids(&explicit), vec![c.c2]);
    }

    #[test]
    fn test_foreign_framework_ids_resolve_to_nothing() {
        let c = catalog();
        let resolver = RequirementResolver::new(c.db.clone());
        let other = c.db.insert_framework(1, "F2", false).unwrap();
        let other_policy = c.db.insert_policy(1, other, "X").unwrap();
        let other_sub = c.db.insert_sub_policy(1, other_policy, "X1").unwrap();
        let foreign = c.db.insert_compliance(1, &NewCompliance::new(other_sub, "X1-1", "foreign")).unwrap();

        let audit_id = c.db.insert_audit(1, &NewAudit::new(c.framework, "Audit", Utc::now())).unwrap();
        let audit = c.db.get_audit(1, audit_id).unwrap().unwrap();

        let explicit = resolver.resolve_for_document(1, &audit, &[], Some(&[foreign, c.c1])).unwrap();
        assert_eq!(ids(&explicit), vec![c.c1]);

        let by_sub = vec![EvidenceMapping { sub_policy_id: Some(other_sub), ..Default::default() }];
        assert!(resolver.resolve_for_document(1, &audit, &by_sub, None).unwrap().is_empty());
        let by_policy = vec![EvidenceMapping { policy_id: Some(other_policy), ..Default::default() }];
        assert!(resolver.resolve_for_document(1, &audit, &by_policy, None).unwrap().is_empty());
    }
}
