//! Pure role→permission decisions plus classification gating, with optional
//! per-role/department overrides from the policies repository (spec.md
//! §4.7).

use crate::domain::{Classification, PolicyRecord, Principal, Role};
use crate::stores::PoliciesRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Backups,
    Restores,
    Audit,
    Admin,
}

impl Permission {
    fn as_str(self) -> &'static str {
        match self {
            Permission::Backups => "backups",
            Permission::Restores => "restores",
            Permission::Audit => "audit",
            Permission::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
    pub reason_category: String,
    pub role: Option<Role>,
    pub required_permission: Option<String>,
    pub classification: Option<Classification>,
}

impl Decision {
    fn denied(reason: impl Into<String>, reason_category: impl Into<String>, role: Option<Role>) -> Self {
        Decision {
            allowed: false,
            reason: reason.into(),
            reason_category: reason_category.into(),
            role,
            required_permission: None,
            classification: None,
        }
    }

    fn allowed(role: Role) -> Self {
        Decision {
            allowed: true,
            reason: "allowed".into(),
            reason_category: "allowed".into(),
            role: Some(role),
            required_permission: None,
            classification: None,
        }
    }
}

fn default_role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Operator => &[Permission::Backups],
        Role::Admin => &[Permission::Backups, Permission::Restores, Permission::Audit, Permission::Admin],
        Role::SuperAdmin => &[Permission::Backups, Permission::Restores, Permission::Audit, Permission::Admin],
    }
}

pub struct PolicyEngine {
    policies: std::sync::Arc<dyn PoliciesRepository>,
}

impl PolicyEngine {
    pub fn new(policies: std::sync::Arc<dyn PoliciesRepository>) -> Self {
        Self { policies }
    }

    pub fn authorize(&self, principal: Option<&Principal>, permission: Permission) -> Decision {
        let principal = match principal {
            Some(p) => p,
            None => return Decision::denied("no authenticated principal", "missing_principal", None),
        };

        if default_role_permissions(principal.role).contains(&permission) {
            Decision::allowed(principal.role)
        } else {
            let mut d = Decision::denied(
                format!("role {} lacks permission {}", principal.role, permission.as_str()),
                "insufficient_role",
                Some(principal.role),
            );
            d.required_permission = Some(permission.as_str().to_string());
            d
        }
    }

    /// Find a policy override for this (role, classification[, department])
    /// combination, if one was administered through `/admin/policies`.
    async fn find_override(&self, role: Role, classification: Classification, department: Option<&str>) -> Option<PolicyRecord> {
        let all = self.policies.list().await.ok()?;
        all.into_iter().find(|p| {
            p.role == role
                && p.classification == classification
                && match (&p.department, department) {
                    (None, _) => true,
                    (Some(pd), Some(d)) => pd == d,
                    (Some(_), None) => false,
                }
        })
    }

    pub async fn evaluate_backup(&self, principal: Option<&Principal>, classification: Classification) -> Decision {
        let base = self.authorize(principal, Permission::Backups);
        if !base.allowed {
            return base;
        }
        let principal = principal.expect("authorize(Some) implies principal present");

        if let Some(policy) = self.find_override(principal.role, classification, principal.department.as_deref()).await {
            if !policy.backup_allowed {
                let mut d = Decision::denied(
                    format!("policy {} forbids backups of classification {classification}", policy.policy_id),
                    "classification_denied",
                    Some(principal.role),
                );
                d.classification = Some(classification);
                return d;
            }
        }

        let mut d = Decision::allowed(principal.role);
        d.classification = Some(classification);
        d
    }

    /// Restore requires role in {admin, super_admin} regardless of
    /// classification (spec.md §4.7).
    pub async fn evaluate_restore(&self, principal: Option<&Principal>, classification: Classification) -> Decision {
        let principal = match principal {
            Some(p) => p,
            None => return Decision::denied("no authenticated principal", "missing_principal", None),
        };

        if !matches!(principal.role, Role::Admin | Role::SuperAdmin) {
            let mut d = Decision::denied(
                format!("role {} cannot initiate restores", principal.role),
                "insufficient_role",
                Some(principal.role),
            );
            d.required_permission = Some(Permission::Restores.as_str().to_string());
            return d;
        }

        if let Some(policy) = self.find_override(principal.role, classification, principal.department.as_deref()).await {
            if !policy.restore_allowed {
                let mut d = Decision::denied(
                    format!("policy {} forbids restores of classification {classification}", policy.policy_id),
                    "classification_denied",
                    Some(principal.role),
                );
                d.classification = Some(classification);
                return d;
            }
        }

        let mut d = Decision::allowed(principal.role);
        d.classification = Some(classification);
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryPoliciesRepository;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(std::sync::Arc::new(InMemoryPoliciesRepository::new()))
    }

    fn principal(role: Role) -> Principal {
        Principal {
            key_id: "key-1".into(),
            role,
            department: Some("IT".into()),
        }
    }

    #[test]
    fn missing_principal_is_denied() {
        let decision = engine().authorize(None, Permission::Backups);
        assert!(!decision.allowed);
        assert_eq!(decision.reason_category, "missing_principal");
    }

    #[test]
    fn operator_has_backups_not_admin() {
        let engine = engine();
        let p = principal(Role::Operator);
        assert!(engine.authorize(Some(&p), Permission::Backups).allowed);
        assert!(!engine.authorize(Some(&p), Permission::Admin).allowed);
    }

    #[tokio::test]
    async fn restore_requires_admin_or_super_admin() {
        let engine = engine();
        let operator = principal(Role::Operator);
        let admin = principal(Role::Admin);
        assert!(!engine.evaluate_restore(Some(&operator), Classification::Public).await.allowed);
        assert!(engine.evaluate_restore(Some(&admin), Classification::Secret).await.allowed);
    }

    #[tokio::test]
    async fn backup_allowed_by_default_for_every_role() {
        let engine = engine();
        let operator = principal(Role::Operator);
        assert!(engine.evaluate_backup(Some(&operator), Classification::Secret).await.allowed);
    }
}
