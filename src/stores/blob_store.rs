use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Put/get opaque byte objects under `(bucket, name)` (spec.md §2).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), AppError>;
    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, AppError>;
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), AppError> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), name.to_string()), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, AppError> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| AppError::ExecutionUnavailable {
                message: format!("object {bucket}/{name} not found"),
                reason_category: "storage_unavailable".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryBlobStore::new();
        store.put("b", "n", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("b", "n").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn get_missing_is_unavailable() {
        let store = InMemoryBlobStore::new();
        assert!(store.get("b", "missing").await.is_err());
    }
}
