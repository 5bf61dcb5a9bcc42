use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Load raw key bytes by version id; expose the active version id
/// (spec.md §2). Key generation itself is out of scope — material is
/// provisioned externally and seeded here.
#[async_trait]
pub trait KeyMaterialStore: Send + Sync {
    async fn resolve(&self, version_id: &str) -> Result<Option<[u8; 32]>, AppError>;
    async fn active_version(&self) -> Result<Option<String>, AppError>;
    async fn set_active_version(&self, version_id: &str);
    /// Provision raw key bytes for a version id (test/seed helper — in
    /// production this would be loaded from an external key-material
    /// provider, never generated here).
    async fn put(&self, version_id: &str, bytes: [u8; 32]);
}

#[derive(Default)]
pub struct InMemoryKeyMaterialStore {
    keys: Arc<RwLock<HashMap<String, [u8; 32]>>>,
    active: Arc<RwLock<Option<String>>>,
}

impl InMemoryKeyMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyMaterialStore for InMemoryKeyMaterialStore {
    async fn resolve(&self, version_id: &str) -> Result<Option<[u8; 32]>, AppError> {
        Ok(self.keys.read().await.get(version_id).copied())
    }

    async fn active_version(&self) -> Result<Option<String>, AppError> {
        Ok(self.active.read().await.clone())
    }

    async fn set_active_version(&self, version_id: &str) {
        *self.active.write().await = Some(version_id.to_string());
    }

    async fn put(&self, version_id: &str, bytes: [u8; 32]) {
        self.keys.write().await.insert(version_id.to_string(), bytes);
    }
}
