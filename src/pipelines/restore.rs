//! Restore: MFA → metadata lookup → policy → incident gate → IRREVERSIBLE
//! check → ciphertext fetch → integrity checks → token issue. Step order is
//! load-bearing (spec.md §4.3) — MFA runs before backup existence is ever
//! revealed, and integrity failures never say which sub-check tripped.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{AuditChainEngine, NewEvent};
use crate::config::Settings;
use crate::crypto::{decrypt_blob, sha512_hex};
use crate::domain::{BackupStatus, Classification, IncidentLevel, Principal};
use crate::error::AppError;
use crate::services::{AuthService, IncidentService, KeyManagementService, MonitoringService, PolicyEngine, RestoreAccessTokenService};
use crate::stores::{BackupsRepository, BlobStore};

pub struct RestoreRequest {
    pub backup_id: String,
    pub mfa_token: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)]
pub enum RestoreOutcome {
    RestoreCompleted {
        backup_id: String,
        integrity_verified: bool,
        restored_size: u64,
        restore_token: String,
        restore_token_expires_at: chrono::DateTime<chrono::Utc>,
        restore_token_ttl_seconds: i64,
    },
    PendingManualReview {
        backup_id: String,
        restriction_reason: &'static str,
    },
    MetadataLoaded {
        backup_id: String,
        classification: Classification,
    },
}

pub struct RestorePipeline {
    settings: Arc<Settings>,
    auth: Arc<AuthService>,
    policy: Arc<PolicyEngine>,
    backups: Arc<dyn BackupsRepository>,
    blob_store: Arc<dyn BlobStore>,
    key_management: Arc<KeyManagementService>,
    incident: Arc<IncidentService>,
    tokens: Arc<RestoreAccessTokenService>,
    monitoring: Arc<MonitoringService>,
    audit: Arc<AuditChainEngine>,
}

impl RestorePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Arc<Settings>,
        auth: Arc<AuthService>,
        policy: Arc<PolicyEngine>,
        backups: Arc<dyn BackupsRepository>,
        blob_store: Arc<dyn BlobStore>,
        key_management: Arc<KeyManagementService>,
        incident: Arc<IncidentService>,
        tokens: Arc<RestoreAccessTokenService>,
        monitoring: Arc<MonitoringService>,
        audit: Arc<AuditChainEngine>,
    ) -> Self {
        Self {
            settings,
            auth,
            policy,
            backups,
            blob_store,
            key_management,
            incident,
            tokens,
            monitoring,
            audit,
        }
    }

    async fn note_security_event(&self, source_event: &str, actor_key_id: &str, backup_id: &str) {
        if let Err(e) = self
            .monitoring
            .process_security_event(source_event, Some(actor_key_id), Some(backup_id), None)
            .await
        {
            warn!(error = %e, source_event, "monitoring hook failed, continuing");
        }
    }

    pub async fn restore(
        &self,
        principal: &Principal,
        request: RestoreRequest,
        client_ip: Option<&str>,
    ) -> Result<RestoreOutcome, AppError> {
        // Step 1: MFA, before metadata existence is revealed.
        self.auth
            .validate_mfa_token(principal, request.mfa_token.as_deref(), client_ip)
            .await?;

        // Step 2: metadata lookup.
        let mut metadata = self
            .backups
            .get(&request.backup_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                message: format!("backup {} not found", request.backup_id),
                code: "RESTORE_BACKUP_NOT_FOUND",
            })?;

        // Step 3: policy decision.
        let decision = self.policy.evaluate_restore(Some(principal), metadata.classification).await;
        self.audit
            .append(
                NewEvent::new("restore_policy_decision", "backup")
                    .resource_id(request.backup_id.clone())
                    .actor(Some(principal.key_id.clone()), Some(principal.role.to_string()))
                    .status(if decision.allowed { "allowed" } else { "denied" })
                    .reason(decision.reason.clone()),
            )
            .await?;
        if !decision.allowed {
            return Err(AppError::Authorization {
                message: decision.reason,
                reason_category: decision.reason_category,
            });
        }

        // Step 4: incident gate.
        let level = self.incident.current_level().await?;
        match level {
            IncidentLevel::Lockdown => {
                self.audit
                    .append(
                        NewEvent::new("restore_restricted_blocked", "backup")
                            .resource_id(request.backup_id.clone())
                            .actor(Some(principal.key_id.clone()), Some(principal.role.to_string()))
                            .status("blocked")
                            .reason("incident_lockdown"),
                    )
                    .await?;
                self.note_security_event("restore_restricted", &principal.key_id, &request.backup_id).await;
                return Err(AppError::IncidentRestricted {
                    reason_category: "incident_lockdown".into(),
                });
            }
            IncidentLevel::Quarantine => {
                self.audit
                    .append(
                        NewEvent::new("restore_restricted_pending_manual_review", "backup")
                            .resource_id(request.backup_id.clone())
                            .actor(Some(principal.key_id.clone()), Some(principal.role.to_string()))
                            .status("pending_manual_review")
                            .reason("incident_quarantine"),
                    )
                    .await?;
                self.note_security_event("restore_restricted", &principal.key_id, &request.backup_id).await;
                return Ok(RestoreOutcome::PendingManualReview {
                    backup_id: request.backup_id,
                    restriction_reason: "incident_quarantine",
                });
            }
            IncidentLevel::Normal => {}
        }

        // Step 5: IRREVERSIBLE check.
        if metadata.status == BackupStatus::Irreversible {
            self.audit
                .append(
                    NewEvent::new("restore_failed", "backup")
                        .resource_id(request.backup_id.clone())
                        .actor(Some(principal.key_id.clone()), Some(principal.role.to_string()))
                        .status("failed")
                        .reason("irreversible"),
                )
                .await?;
            return Err(AppError::Irreversible {
                reason_category: "irreversible".into(),
            });
        }

        if request.dry_run {
            return Ok(RestoreOutcome::MetadataLoaded {
                backup_id: request.backup_id,
                classification: metadata.classification,
            });
        }

        // Step 6: fetch ciphertext.
        let storage_path = metadata.storage_path.clone().ok_or_else(|| AppError::ExecutionUnavailable {
            message: "backup has no storage path recorded".into(),
            reason_category: "storage_unavailable".into(),
        })?;
        let (bucket, object_name) = storage_path.split_once('/').ok_or_else(|| AppError::ExecutionUnavailable {
            message: "malformed storage path".into(),
            reason_category: "storage_unavailable".into(),
        })?;
        let blob = self.blob_store.get(bucket, object_name).await.map_err(|_| AppError::ExecutionUnavailable {
            message: "blob storage read failed".into(),
            reason_category: "storage_unavailable".into(),
        })?;

        // Step 7: integrity checks, collapsed to a single outcome so the
        // caller never learns which sub-check failed.
        match self.verify_and_decrypt(&blob, &metadata).await {
            Ok(plaintext) => {
                self.audit
                    .append(
                        NewEvent::new("restore_completed", "backup")
                            .resource_id(request.backup_id.clone())
                            .actor(Some(principal.key_id.clone()), Some(principal.role.to_string()))
                            .status("completed"),
                    )
                    .await?;

                let token = self
                    .tokens
                    .issue(
                        request.backup_id.clone(),
                        Some(principal.key_id.clone()),
                        self.settings.restore_token_ttl_seconds,
                    )
                    .await;

                info!(backup_id = %request.backup_id, "restore completed");
                Ok(RestoreOutcome::RestoreCompleted {
                    backup_id: request.backup_id,
                    integrity_verified: true,
                    restored_size: plaintext.len() as u64,
                    restore_token: token.token,
                    restore_token_expires_at: token.expires_at,
                    restore_token_ttl_seconds: self.settings.restore_token_ttl_seconds,
                })
            }
            Err(()) => {
                self.audit
                    .append(
                        NewEvent::new("restore_failed", "backup")
                            .resource_id(request.backup_id.clone())
                            .actor(Some(principal.key_id.clone()), Some(principal.role.to_string()))
                            .status("failed")
                            .reason("integrity_failed"),
                    )
                    .await?;
                self.note_security_event("restore_failed", &principal.key_id, &request.backup_id).await;
                Err(AppError::Integrity)
            }
        }
    }

    async fn verify_and_decrypt(
        &self,
        blob: &[u8],
        metadata: &crate::domain::BackupMetadata,
    ) -> Result<Vec<u8>, ()> {
        if blob.len() < 28 {
            return Err(());
        }
        if let Some(expected) = &metadata.checksum_ciphertext {
            if &sha512_hex(blob) != expected {
                return Err(());
            }
        }
        let nonce_hex = hex::encode(&blob[..12]);
        if let Some(expected_nonce) = &metadata.nonce {
            if &nonce_hex != expected_nonce {
                return Err(());
            }
        }
        let key_version = metadata.key_version.as_deref().ok_or(())?;
        let key = self.key_management.resolve_key(key_version).await.map_err(|_| ())?;
        let plaintext = decrypt_blob(&key, blob).map_err(|_| ())?;
        if let Some(expected) = &metadata.checksum_plaintext {
            if &sha512_hex(&plaintext) != expected {
                return Err(());
            }
        }
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::clock::Clock;
    use crate::crypto::encrypt_blob;
    use crate::domain::{BackupMetadata, Role};
    use crate::stores::{
        InMemoryAlertsRepository, InMemoryApiKeysRepository, InMemoryAuditRepository, InMemoryBackupsRepository,
        InMemoryBlobStore, InMemoryIncidentRepository, InMemoryKeyMaterialStore, InMemoryKeyVersionsRepository,
        InMemoryPoliciesRepository,
    };
    use chrono::Utc;

    fn admin() -> Principal {
        Principal {
            key_id: "admin-1".into(),
            role: Role::Admin,
            department: Some("IT".into()),
        }
    }

    async fn harness() -> (RestorePipeline, Arc<dyn BackupsRepository>, Arc<IncidentService>, [u8; 32]) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let settings = Arc::new(Settings::default());
        let auth = Arc::new(AuthService::new(Arc::new(InMemoryApiKeysRepository::new())));
        let policy = Arc::new(PolicyEngine::new(Arc::new(InMemoryPoliciesRepository::new())));
        let backups: Arc<dyn BackupsRepository> = Arc::new(InMemoryBackupsRepository::new());
        let blob_store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let audit = Arc::new(AuditChainEngine::new(Arc::new(InMemoryAuditRepository::new()), clock.clone(), 10));

        let key_material = Arc::new(InMemoryKeyMaterialStore::new());
        let key_bytes = [5u8; 32];
        key_material.put("v1", key_bytes).await;
        key_material.set_active_version("v1").await;
        let incident = Arc::new(IncidentService::new(Arc::new(InMemoryIncidentRepository::new()), clock.clone()));
        let key_management = Arc::new(KeyManagementService::new(
            Arc::new(InMemoryKeyVersionsRepository::new()),
            key_material,
            backups.clone(),
            incident.clone(),
            audit.clone(),
            clock.clone(),
        ));
        let tokens = Arc::new(RestoreAccessTokenService::new(clock.clone()));
        let monitoring = Arc::new(MonitoringService::new(Arc::new(InMemoryAlertsRepository::new()), audit.clone(), clock.clone()));

        let pipeline = RestorePipeline::new(
            settings,
            auth,
            policy,
            backups.clone(),
            blob_store.clone(),
            key_management,
            incident.clone(),
            tokens,
            monitoring,
            audit,
        );

        let plaintext = b"restorable payload".to_vec();
        let blob = encrypt_blob(&key_bytes, &plaintext).unwrap();
        let nonce_hex = hex::encode(&blob[..12]);
        let checksum_ciphertext = sha512_hex(&blob);
        let checksum_plaintext = sha512_hex(&plaintext);
        blob_store.put("backups", "backup-1.bin", blob).await.unwrap();

        let mut metadata = BackupMetadata::new_processing(
            "backup-1".into(),
            Classification::Secret,
            "system-a".into(),
            None,
            Some("admin-1".into()),
            checksum_plaintext,
            plaintext.len() as u64,
            clock.now(),
        );
        metadata.status = BackupStatus::Active;
        metadata.key_version = Some("v1".into());
        metadata.storage_path = Some("backups/backup-1.bin".into());
        metadata.checksum_ciphertext = Some(checksum_ciphertext.clone());
        metadata.nonce = Some(nonce_hex);
        backups.insert(metadata).await.unwrap();

        (pipeline, backups, incident, key_bytes)
    }

    fn mfa_for(p: &Principal) -> Option<String> {
        Some(format!("mfa:{}", p.key_id))
    }

    #[tokio::test]
    async fn happy_path_issues_token() {
        let (pipeline, _backups, _incident, _key) = harness().await;
        let admin = admin();
        let request = RestoreRequest {
            backup_id: "backup-1".into(),
            mfa_token: mfa_for(&admin),
            dry_run: false,
        };
        let outcome = pipeline.restore(&admin, request, None).await.unwrap();
        match outcome {
            RestoreOutcome::RestoreCompleted { integrity_verified, restore_token, .. } => {
                assert!(integrity_verified);
                assert!(!restore_token.is_empty());
            }
            other => panic!("expected RestoreCompleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_mfa_blocks_before_metadata_lookup() {
        let (pipeline, _backups, _incident, _key) = harness().await;
        let admin = admin();
        let request = RestoreRequest {
            backup_id: "does-not-exist".into(),
            mfa_token: None,
            dry_run: false,
        };
        let err = pipeline.restore(&admin, request, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "mfa_required");
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_integrity_without_detail() {
        let (pipeline, backups, _incident, _key) = harness().await;
        let mut metadata = backups.get("backup-1").await.unwrap().unwrap();
        metadata.checksum_ciphertext = Some("0".repeat(128));
        backups.update(metadata).await.unwrap();

        let admin = admin();
        let request = RestoreRequest {
            backup_id: "backup-1".into(),
            mfa_token: mfa_for(&admin),
            dry_run: false,
        };
        let err = pipeline.restore(&admin, request, None).await.unwrap_err();
        assert!(matches!(err, AppError::Integrity));
    }

    #[tokio::test]
    async fn quarantine_returns_pending_manual_review_without_token() {
        let (pipeline, _backups, incident, _key) = harness().await;
        incident.transition(IncidentLevel::Quarantine, None, None).await.unwrap();

        let admin = admin();
        let request = RestoreRequest {
            backup_id: "backup-1".into(),
            mfa_token: mfa_for(&admin),
            dry_run: false,
        };
        let outcome = pipeline.restore(&admin, request, None).await.unwrap();
        match outcome {
            RestoreOutcome::PendingManualReview { restriction_reason, .. } => {
                assert_eq!(restriction_reason, "incident_quarantine");
            }
            other => panic!("expected PendingManualReview, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lockdown_blocks_restore() {
        let (pipeline, _backups, incident, _key) = harness().await;
        incident.transition(IncidentLevel::Lockdown, None, None).await.unwrap();

        let admin = admin();
        let request = RestoreRequest {
            backup_id: "backup-1".into(),
            mfa_token: mfa_for(&admin),
            dry_run: false,
        };
        let err = pipeline.restore(&admin, request, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "incident_lockdown");
    }

    #[tokio::test]
    async fn dry_run_stops_after_irreversible_check() {
        let (pipeline, _backups, _incident, _key) = harness().await;
        let admin = admin();
        let request = RestoreRequest {
            backup_id: "backup-1".into(),
            mfa_token: mfa_for(&admin),
            dry_run: true,
        };
        let outcome = pipeline.restore(&admin, request, None).await.unwrap();
        assert!(matches!(outcome, RestoreOutcome::MetadataLoaded { .. }));
    }

    #[tokio::test]
    async fn irreversible_backup_is_rejected() {
        let (pipeline, backups, _incident, _key) = harness().await;
        let mut metadata = backups.get("backup-1").await.unwrap().unwrap();
        metadata.status = BackupStatus::Irreversible;
        backups.update(metadata).await.unwrap();

        let admin = admin();
        let request = RestoreRequest {
            backup_id: "backup-1".into(),
            mfa_token: mfa_for(&admin),
            dry_run: false,
        };
        let err = pipeline.restore(&admin, request, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "irreversible");
    }
}
