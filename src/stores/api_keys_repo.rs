use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::ApiKey;
use crate::error::AppError;

#[async_trait]
pub trait ApiKeysRepository: Send + Sync {
    async fn insert(&self, key: ApiKey) -> Result<(), AppError>;
    async fn get_by_id(&self, key_id: &str) -> Result<Option<ApiKey>, AppError>;
    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError>;
    async fn update(&self, key: ApiKey) -> Result<(), AppError>;
    async fn list(&self) -> Result<Vec<ApiKey>, AppError>;
}

#[derive(Default)]
pub struct InMemoryApiKeysRepository {
    rows: Arc<RwLock<HashMap<String, ApiKey>>>,
}

impl InMemoryApiKeysRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeysRepository for InMemoryApiKeysRepository {
    async fn insert(&self, key: ApiKey) -> Result<(), AppError> {
        self.rows.write().await.insert(key.key_id.clone(), key);
        Ok(())
    }

    async fn get_by_id(&self, key_id: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self.rows.read().await.get(key_id).cloned())
    }

    async fn get_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn update(&self, key: ApiKey) -> Result<(), AppError> {
        self.rows.write().await.insert(key.key_id.clone(), key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ApiKey>, AppError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
