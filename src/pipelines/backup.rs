//! Backup submission: policy → metadata insert → key fetch → AEAD encrypt
//! → blob put → metadata finalize, with every branch rolled back to FAILED
//! and every transition audited (spec.md §4.2).

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{AuditChainEngine, NewEvent};
use crate::clock::Clock;
use crate::config::Settings;
use crate::crypto::{encrypt_blob, sha512_hex};
use crate::domain::{BackupMetadata, BackupStatus, Classification, Principal};
use crate::error::AppError;
use crate::services::{KeyManagementService, PolicyEngine};
use crate::stores::{BackupsRepository, BlobStore};

pub struct BackupRequest {
    pub classification: Option<Classification>,
    pub source_system: String,
    pub description: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupAccepted {
    pub status: &'static str,
    pub backup_id: String,
    pub classification: Classification,
    pub source_system: String,
}

pub struct BackupPipeline {
    settings: Arc<Settings>,
    policy: Arc<PolicyEngine>,
    backups: Arc<dyn BackupsRepository>,
    key_management: Arc<KeyManagementService>,
    blob_store: Arc<dyn BlobStore>,
    audit: Arc<AuditChainEngine>,
    clock: Arc<dyn Clock>,
}

impl BackupPipeline {
    pub fn new(
        settings: Arc<Settings>,
        policy: Arc<PolicyEngine>,
        backups: Arc<dyn BackupsRepository>,
        key_management: Arc<KeyManagementService>,
        blob_store: Arc<dyn BlobStore>,
        audit: Arc<AuditChainEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            policy,
            backups,
            key_management,
            blob_store,
            audit,
            clock,
        }
    }

    fn validate_request(&self, request: &BackupRequest) -> Result<(), AppError> {
        let len = request.source_system.chars().count();
        if !(2..=200).contains(&len) {
            return Err(AppError::Validation {
                message: "source_system must be between 2 and 200 characters".into(),
                reason_category: "invalid_source_system".into(),
                loc: vec!["body".into(), "source_system".into()],
            });
        }
        if let Some(description) = &request.description {
            if description.chars().count() > 255 {
                return Err(AppError::Validation {
                    message: "description must be at most 255 characters".into(),
                    reason_category: "invalid_description".into(),
                    loc: vec!["body".into(), "description".into()],
                });
            }
        }
        if request.payload.len() > self.settings.max_payload_bytes {
            return Err(AppError::Validation {
                message: format!("payload exceeds the {} byte limit", self.settings.max_payload_bytes),
                reason_category: "payload_too_large".into(),
                loc: vec!["body".into(), "payload".into()],
            });
        }
        Ok(())
    }

    fn resolve_classification(&self, request: &BackupRequest) -> Result<Classification, AppError> {
        match request.classification {
            Some(c) => Ok(c),
            None if self.settings.classification_required => Err(AppError::Validation {
                message: "classification is required".into(),
                reason_category: "classification_required".into(),
                loc: vec!["body".into(), "classification".into()],
            }),
            None => self.settings.resolve_default_classification(),
        }
    }

    async fn mark_failed(&self, backup_id: &str, reason: &str) {
        if let Ok(Some(mut metadata)) = self.backups.get(backup_id).await {
            metadata.status = BackupStatus::Failed;
            let _ = self.backups.update(metadata).await;
        }
        let appended = self
            .audit
            .append(
                NewEvent::new("backup_processing_failed", "backup")
                    .resource_id(backup_id)
                    .status("failed")
                    .reason(reason),
            )
            .await;
        if let Err(e) = appended {
            warn!(error = %e, backup_id, "failed to audit backup failure itself");
        }
    }

    pub async fn submit(
        &self,
        principal: Option<&Principal>,
        request: BackupRequest,
        _client_ip: Option<&str>,
    ) -> Result<BackupAccepted, AppError> {
        self.validate_request(&request)?;
        let classification = self.resolve_classification(&request)?;

        let backup_id = self.clock.new_id();

        let decision = self.policy.evaluate_backup(principal, classification).await;
        self.audit
            .append(
                NewEvent::new("backup_policy_decision", "backup")
                    .resource_id(backup_id.clone())
                    .actor(
                        principal.map(|p| p.key_id.clone()),
                        principal.map(|p| p.role.to_string()),
                    )
                    .status(if decision.allowed { "allowed" } else { "denied" })
                    .reason(decision.reason.clone()),
            )
            .await?;

        if !decision.allowed {
            self.audit
                .append(
                    NewEvent::new("backup_processing_denied", "backup")
                        .resource_id(backup_id.clone())
                        .actor(
                            principal.map(|p| p.key_id.clone()),
                            principal.map(|p| p.role.to_string()),
                        )
                        .status("denied")
                        .reason(decision.reason_category.clone()),
                )
                .await?;
            return Err(AppError::Authorization {
                message: decision.reason,
                reason_category: decision.reason_category,
            });
        }

        let checksum_plaintext = sha512_hex(&request.payload);
        let metadata = BackupMetadata::new_processing(
            backup_id.clone(),
            classification,
            request.source_system.clone(),
            request.description.clone(),
            principal.map(|p| p.key_id.clone()),
            checksum_plaintext.clone(),
            request.payload.len() as u64,
            self.clock.now(),
        );
        self.backups.insert(metadata).await?;
        self.audit
            .append(
                NewEvent::new("backup_processing_started", "backup")
                    .resource_id(backup_id.clone())
                    .actor(
                        principal.map(|p| p.key_id.clone()),
                        principal.map(|p| p.role.to_string()),
                    )
                    .status("processing"),
            )
            .await?;

        let (key_version, key_bytes) = match self.key_management.active_key().await {
            Ok(k) => k,
            Err(_) => {
                self.mark_failed(&backup_id, "key_unavailable").await;
                return Err(AppError::UploadFailed {
                    message: "no active key material available".into(),
                    reason_category: "key_unavailable".into(),
                });
            }
        };

        let mut metadata = self.backups.get(&backup_id).await?.ok_or_else(|| AppError::UploadFailed {
            message: "backup row disappeared mid-pipeline".into(),
            reason_category: "storage_failed".into(),
        })?;
        metadata.key_version = Some(key_version.clone());
        self.backups.update(metadata.clone()).await?;

        let blob = match encrypt_blob(&key_bytes, &request.payload) {
            Ok(b) => b,
            Err(_) => {
                self.mark_failed(&backup_id, "encryption_failed").await;
                return Err(AppError::UploadFailed {
                    message: "authenticated encryption failed".into(),
                    reason_category: "encryption_failed".into(),
                });
            }
        };
        let nonce_hex = hex::encode(&blob[..12]);
        let checksum_ciphertext = sha512_hex(&blob);

        let object_name = format!("{backup_id}.bin");
        if self.blob_store.put(&self.settings.bucket_name, &object_name, blob.clone()).await.is_err() {
            self.mark_failed(&backup_id, "storage_failed").await;
            return Err(AppError::UploadFailed {
                message: "blob storage write failed".into(),
                reason_category: "storage_failed".into(),
            });
        }

        metadata.status = BackupStatus::Active;
        metadata.storage_path = Some(format!("{}/{object_name}", self.settings.bucket_name));
        metadata.checksum_ciphertext = Some(checksum_ciphertext);
        metadata.nonce = Some(nonce_hex);
        metadata.encrypted_size = Some(blob.len() as u64);
        self.backups.update(metadata).await?;

        self.audit
            .append(
                NewEvent::new("backup_processing_succeeded", "backup")
                    .resource_id(backup_id.clone())
                    .actor(
                        principal.map(|p| p.key_id.clone()),
                        principal.map(|p| p.role.to_string()),
                    )
                    .status("active"),
            )
            .await?;

        info!(backup_id, "backup submission completed");
        Ok(BackupAccepted {
            status: "accepted",
            backup_id,
            classification,
            source_system: request.source_system,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::domain::Role;
    use crate::stores::{
        InMemoryAuditRepository, InMemoryBackupsRepository, InMemoryBlobStore, InMemoryIncidentRepository,
        InMemoryKeyMaterialStore, InMemoryKeyVersionsRepository, InMemoryPoliciesRepository,
    };
    use chrono::Utc;

    async fn pipeline_with_settings(settings: Settings) -> (BackupPipeline, Arc<dyn BackupsRepository>, Arc<dyn BlobStore>) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let settings = Arc::new(settings);
        let policy = Arc::new(PolicyEngine::new(Arc::new(InMemoryPoliciesRepository::new())));
        let backups: Arc<dyn BackupsRepository> = Arc::new(InMemoryBackupsRepository::new());
        let blob_store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let audit = Arc::new(AuditChainEngine::new(Arc::new(InMemoryAuditRepository::new()), clock.clone(), 10));

        let key_material = Arc::new(InMemoryKeyMaterialStore::new());
        key_material.put("v1", [3u8; 32]).await;
        key_material.set_active_version("v1").await;
        let incident = Arc::new(crate::services::IncidentService::new(
            Arc::new(InMemoryIncidentRepository::new()),
            clock.clone(),
        ));
        let key_management = Arc::new(KeyManagementService::new(
            Arc::new(InMemoryKeyVersionsRepository::new()),
            key_material,
            backups.clone(),
            incident,
            audit.clone(),
            clock.clone(),
        ));

        let pipeline = BackupPipeline::new(settings, policy, backups.clone(), key_management, blob_store.clone(), audit, clock);
        (pipeline, backups, blob_store)
    }

    async fn pipeline() -> (BackupPipeline, Arc<dyn BackupsRepository>, Arc<dyn BlobStore>) {
        pipeline_with_settings(Settings::default()).await
    }

    fn operator() -> Principal {
        Principal {
            key_id: "key-1".into(),
            role: Role::Operator,
            department: Some("IT".into()),
        }
    }

    #[tokio::test]
    async fn happy_path_reaches_active() {
        let (pipeline, backups, _blob) = pipeline().await;
        let request = BackupRequest {
            classification: Some(Classification::Public),
            source_system: "system-a".into(),
            description: None,
            payload: b"p".to_vec(),
        };
        let result = pipeline.submit(Some(&operator()), request, None).await.unwrap();
        assert_eq!(result.status, "accepted");

        let row = backups.get(&result.backup_id).await.unwrap().unwrap();
        assert_eq!(row.status, BackupStatus::Active);
        assert!(row.is_fully_populated_active());
        assert_eq!(row.checksum_plaintext.unwrap(), sha512_hex(b"p"));
    }

    #[tokio::test]
    async fn source_system_length_boundary() {
        let (pipeline, _backups, _blob) = pipeline().await;
        let too_short = BackupRequest {
            classification: Some(Classification::Public),
            source_system: "a".into(),
            description: None,
            payload: vec![],
        };
        let err = pipeline.submit(Some(&operator()), too_short, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "invalid_source_system");

        let ok = BackupRequest {
            classification: Some(Classification::Public),
            source_system: "ab".into(),
            description: None,
            payload: vec![],
        };
        assert!(pipeline.submit(Some(&operator()), ok, None).await.is_ok());
    }

    #[tokio::test]
    async fn missing_classification_without_required_flag_uses_default() {
        let mut settings = Settings::default();
        settings.default_classification = Some("INTERNAL".into());
        let (pipeline, _backups, _blob) = pipeline_with_settings(settings).await;

        let request = BackupRequest {
            classification: None,
            source_system: "system-a".into(),
            description: None,
            payload: vec![],
        };
        let result = pipeline.submit(Some(&operator()), request, None).await.unwrap();
        assert_eq!(result.classification, Classification::Internal);
    }
}
