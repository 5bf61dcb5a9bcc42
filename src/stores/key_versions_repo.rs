use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::KeyVersion;
use crate::error::AppError;

#[async_trait]
pub trait KeyVersionsRepository: Send + Sync {
    async fn get(&self, version_id: &str) -> Result<Option<KeyVersion>, AppError>;
    async fn upsert(&self, version: KeyVersion) -> Result<(), AppError>;
    async fn active(&self) -> Result<Option<KeyVersion>, AppError>;
    async fn list(&self) -> Result<Vec<KeyVersion>, AppError>;
}

#[derive(Default)]
pub struct InMemoryKeyVersionsRepository {
    rows: Arc<RwLock<HashMap<String, KeyVersion>>>,
}

impl InMemoryKeyVersionsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyVersionsRepository for InMemoryKeyVersionsRepository {
    async fn get(&self, version_id: &str) -> Result<Option<KeyVersion>, AppError> {
        Ok(self.rows.read().await.get(version_id).cloned())
    }

    async fn upsert(&self, version: KeyVersion) -> Result<(), AppError> {
        self.rows.write().await.insert(version.version_id.clone(), version);
        Ok(())
    }

    async fn active(&self) -> Result<Option<KeyVersion>, AppError> {
        Ok(self.rows.read().await.values().find(|v| v.is_active).cloned())
    }

    async fn list(&self) -> Result<Vec<KeyVersion>, AppError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
