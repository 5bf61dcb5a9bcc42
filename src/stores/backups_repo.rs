use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::BackupMetadata;
use crate::error::AppError;

#[async_trait]
pub trait BackupsRepository: Send + Sync {
    async fn insert(&self, metadata: BackupMetadata) -> Result<(), AppError>;
    async fn get(&self, backup_id: &str) -> Result<Option<BackupMetadata>, AppError>;
    /// Replace the stored row wholesale. Callers read-modify-write; the
    /// in-memory store serializes this under one lock, a real store would
    /// use an `UPDATE ... WHERE backup_id = ?`.
    async fn update(&self, metadata: BackupMetadata) -> Result<(), AppError>;
    /// All backups bound to a key version — used by crypto-shred.
    async fn list_by_key_version(&self, version_id: &str) -> Result<Vec<BackupMetadata>, AppError>;
}

#[derive(Default)]
pub struct InMemoryBackupsRepository {
    rows: Arc<RwLock<HashMap<String, BackupMetadata>>>,
}

impl InMemoryBackupsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackupsRepository for InMemoryBackupsRepository {
    async fn insert(&self, metadata: BackupMetadata) -> Result<(), AppError> {
        self.rows.write().await.insert(metadata.backup_id.clone(), metadata);
        Ok(())
    }

    async fn get(&self, backup_id: &str) -> Result<Option<BackupMetadata>, AppError> {
        Ok(self.rows.read().await.get(backup_id).cloned())
    }

    async fn update(&self, metadata: BackupMetadata) -> Result<(), AppError> {
        self.rows.write().await.insert(metadata.backup_id.clone(), metadata);
        Ok(())
    }

    async fn list_by_key_version(&self, version_id: &str) -> Result<Vec<BackupMetadata>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|b| b.key_version.as_deref() == Some(version_id))
            .cloned()
            .collect())
    }
}
