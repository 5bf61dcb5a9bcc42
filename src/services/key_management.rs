//! Active-version tracking, rotation, and crypto-shred (spec.md §4.4).

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::audit::{AuditChainEngine, NewEvent};
use crate::clock::Clock;
use crate::domain::{BackupStatus, KeyVersion, Principal};
use crate::error::AppError;
use crate::services::incident::IncidentService;
use crate::stores::{BackupsRepository, KeyMaterialStore, KeyVersionsRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    Rotated,
    NoStateChange,
}

#[derive(Debug, Clone, Serialize)]
pub struct CryptoShredOutcome {
    pub version_id: String,
    pub destroyed: bool,
    pub affected_backups: u64,
    pub incident_effect: String,
}

pub struct KeyManagementService {
    key_versions: Arc<dyn KeyVersionsRepository>,
    key_material: Arc<dyn KeyMaterialStore>,
    backups: Arc<dyn BackupsRepository>,
    incident: Arc<IncidentService>,
    audit: Arc<AuditChainEngine>,
    clock: Arc<dyn Clock>,
}

impl KeyManagementService {
    pub fn new(
        key_versions: Arc<dyn KeyVersionsRepository>,
        key_material: Arc<dyn KeyMaterialStore>,
        backups: Arc<dyn BackupsRepository>,
        incident: Arc<IncidentService>,
        audit: Arc<AuditChainEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key_versions,
            key_material,
            backups,
            incident,
            audit,
            clock,
        }
    }

    /// Active key material, for the backup pipeline's AEAD step.
    pub async fn active_key(&self) -> Result<(String, [u8; 32]), AppError> {
        let version_id = self
            .key_material
            .active_version()
            .await?
            .ok_or_else(|| AppError::ExecutionUnavailable {
                message: "no active key version configured".into(),
                reason_category: "key_unavailable".into(),
            })?;
        let bytes = self
            .key_material
            .resolve(&version_id)
            .await?
            .ok_or_else(|| AppError::ExecutionUnavailable {
                message: format!("key material for active version {version_id} is missing"),
                reason_category: "key_unavailable".into(),
            })?;
        Ok((version_id, bytes))
    }

    pub async fn resolve_key(&self, version_id: &str) -> Result<[u8; 32], AppError> {
        self.key_material
            .resolve(version_id)
            .await?
            .ok_or_else(|| AppError::ExecutionUnavailable {
                message: format!("key material for version {version_id} is missing"),
                reason_category: "key_unavailable".into(),
            })
    }

    pub async fn rotate_active_version(
        &self,
        to_version_id: &str,
        actor: &Principal,
        reason: Option<String>,
        client_ip: Option<&str>,
    ) -> Result<RotationOutcome, AppError> {
        let current = self.key_versions.active().await?;
        if current.as_ref().map(|v| v.version_id.as_str()) == Some(to_version_id) {
            return Ok(RotationOutcome::NoStateChange);
        }

        if self.key_material.resolve(to_version_id).await?.is_none() {
            return Err(AppError::StateError {
                message: format!("key material for {to_version_id} is not resolvable"),
                reason_category: "key_rotation_invalid".into(),
            });
        }

        let mut target = self.key_versions.get(to_version_id).await?.unwrap_or_else(|| {
            KeyVersion::new(to_version_id.to_string(), self.clock.now())
        });
        if target.is_destroyed {
            return Err(AppError::StateError {
                message: format!("key version {to_version_id} is destroyed"),
                reason_category: "key_rotation_invalid".into(),
            });
        }

        if let Some(mut old) = current.clone() {
            old.is_active = false;
            self.key_versions.upsert(old).await?;
        }

        target.is_active = true;
        target.rotated_from_version = current.as_ref().map(|v| v.version_id.clone());
        target.rotation_reason = reason.clone();
        target.created_by_key_id = Some(actor.key_id.clone());
        target.activated_at = Some(self.clock.now());
        self.key_versions.upsert(target).await?;
        self.key_material.set_active_version(to_version_id).await;

        self.audit
            .append(
                NewEvent::new("key_rotation", "key_version")
                    .resource_id(to_version_id)
                    .actor(Some(actor.key_id.clone()), Some(actor.role.to_string()))
                    .status("rotated")
                    .reason(reason.unwrap_or_else(|| "unspecified".into())),
            )
            .await?;

        info!(to_version_id, client_ip, "key version rotated");
        Ok(RotationOutcome::Rotated)
    }

    /// Privileged destructive operation. Preconditions are checked by the
    /// caller (the restore pipeline/admin handler resolves principal role,
    /// confirmation phrase, and MFA); this method performs the atomic
    /// cross-entity update and forced incident escalation.
    pub async fn execute_crypto_shred(
        &self,
        version_id: &str,
        actor: &Principal,
    ) -> Result<CryptoShredOutcome, AppError> {
        self.audit
            .append(
                NewEvent::new("crypto_shred_started", "key_version")
                    .resource_id(version_id)
                    .actor(Some(actor.key_id.clone()), Some(actor.role.to_string())),
            )
            .await?;

        let mut target = self
            .key_versions
            .get(version_id)
            .await?
            .ok_or_else(|| AppError::CryptoShredDenied {
                message: format!("key version {version_id} not found"),
                reason_category: "key_not_found".into(),
            })?;
        if target.is_destroyed {
            return Err(AppError::CryptoShredDenied {
                message: format!("key version {version_id} already destroyed"),
                reason_category: "already_destroyed".into(),
            });
        }

        let destroyed_at = self.clock.now();
        target.is_destroyed = true;
        target.is_active = false;
        target.destroyed_at = Some(destroyed_at);
        self.key_versions.upsert(target).await?;

        let bound = self.backups.list_by_key_version(version_id).await?;
        let affected = bound.len() as u64;
        for mut backup in bound {
            backup.status = BackupStatus::Irreversible;
            backup.irreversible_reason = Some("crypto_shredded".into());
            backup.shredded_at = Some(destroyed_at);
            self.backups.update(backup).await?;
        }

        let incident_effect = self
            .incident
            .force_lockdown(Some(actor.key_id.clone()), "crypto_shred_executed")
            .await?;

        self.audit
            .append(
                NewEvent::new("incident_effect_applied", "incident_state")
                    .resource_id(incident_effect.as_str())
                    .actor(Some(actor.key_id.clone()), Some(actor.role.to_string())),
            )
            .await?;

        self.audit
            .append(
                NewEvent::new("crypto_shred_completed", "key_version")
                    .resource_id(version_id)
                    .actor(Some(actor.key_id.clone()), Some(actor.role.to_string()))
                    .status("destroyed"),
            )
            .await?;

        Ok(CryptoShredOutcome {
            version_id: version_id.to_string(),
            destroyed: true,
            affected_backups: affected,
            incident_effect: incident_effect.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::domain::{Classification, Role};
    use crate::stores::{
        InMemoryAuditRepository, InMemoryBackupsRepository, InMemoryIncidentRepository,
        InMemoryKeyMaterialStore, InMemoryKeyVersionsRepository,
    };
    use chrono::Utc;

    async fn harness() -> (KeyManagementService, Arc<dyn BackupsRepository>) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let key_material = Arc::new(InMemoryKeyMaterialStore::new());
        key_material.put("v1", [1u8; 32]).await;
        key_material.put("v2", [2u8; 32]).await;
        key_material.set_active_version("v1").await;

        let key_versions = Arc::new(InMemoryKeyVersionsRepository::new());
        let mut v1 = KeyVersion::new("v1".into(), clock.now());
        v1.is_active = true;
        key_versions.upsert(v1).await.unwrap();

        let backups: Arc<dyn BackupsRepository> = Arc::new(InMemoryBackupsRepository::new());
        let incident = Arc::new(IncidentService::new(
            Arc::new(InMemoryIncidentRepository::new()),
            clock.clone(),
        ));
        let audit = Arc::new(AuditChainEngine::new(
            Arc::new(InMemoryAuditRepository::new()),
            clock.clone(),
            10,
        ));

        let service = KeyManagementService::new(
            key_versions,
            key_material,
            backups.clone(),
            incident,
            audit,
            clock,
        );
        (service, backups)
    }

    fn super_admin() -> Principal {
        Principal {
            key_id: "root-key".into(),
            role: Role::SuperAdmin,
            department: None,
        }
    }

    #[tokio::test]
    async fn rotation_to_current_is_no_op() {
        let (service, _) = harness().await;
        let outcome = service
            .rotate_active_version("v1", &super_admin(), None, None)
            .await
            .unwrap();
        assert_eq!(outcome, RotationOutcome::NoStateChange);
    }

    #[tokio::test]
    async fn rotation_flips_active_flag() {
        let (service, _) = harness().await;
        let outcome = service
            .rotate_active_version("v2", &super_admin(), Some("scheduled".into()), None)
            .await
            .unwrap();
        assert_eq!(outcome, RotationOutcome::Rotated);
        let (active_id, _) = service.active_key().await.unwrap();
        assert_eq!(active_id, "v2");
    }

    #[tokio::test]
    async fn crypto_shred_cascades_to_bound_backups_and_escalates() {
        let (service, backups) = harness().await;
        for id in ["backup-1", "backup-2"] {
            let mut b = crate::domain::BackupMetadata::new_processing(
                id.into(),
                Classification::Secret,
                "system-a".into(),
                None,
                None,
                "chk".into(),
                10,
                Utc::now(),
            );
            b.status = BackupStatus::Active;
            b.key_version = Some("v1".into());
            backups.insert(b).await.unwrap();
        }

        let outcome = service.execute_crypto_shred("v1", &super_admin()).await.unwrap();
        assert!(outcome.destroyed);
        assert_eq!(outcome.affected_backups, 2);
        assert_eq!(outcome.incident_effect, "escalated_to_lockdown");

        for id in ["backup-1", "backup-2"] {
            let row = backups.get(id).await.unwrap().unwrap();
            assert_eq!(row.status, BackupStatus::Irreversible);
            assert!(row.shredded_at.is_some());
        }
    }

    #[tokio::test]
    async fn shredding_twice_is_denied() {
        let (service, _) = harness().await;
        service.execute_crypto_shred("v1", &super_admin()).await.unwrap();
        let err = service.execute_crypto_shred("v1", &super_admin()).await.unwrap_err();
        assert_eq!(err.reason_category(), "already_destroyed");
    }
}
