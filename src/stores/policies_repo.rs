use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::PolicyRecord;
use crate::error::AppError;

#[async_trait]
pub trait PoliciesRepository: Send + Sync {
    async fn insert(&self, policy: PolicyRecord) -> Result<(), AppError>;
    async fn get(&self, policy_id: &str) -> Result<Option<PolicyRecord>, AppError>;
    async fn update(&self, policy: PolicyRecord) -> Result<(), AppError>;
    async fn list(&self) -> Result<Vec<PolicyRecord>, AppError>;
}

#[derive(Default)]
pub struct InMemoryPoliciesRepository {
    rows: Arc<RwLock<HashMap<String, PolicyRecord>>>,
}

impl InMemoryPoliciesRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PoliciesRepository for InMemoryPoliciesRepository {
    async fn insert(&self, policy: PolicyRecord) -> Result<(), AppError> {
        self.rows.write().await.insert(policy.policy_id.clone(), policy);
        Ok(())
    }

    async fn get(&self, policy_id: &str) -> Result<Option<PolicyRecord>, AppError> {
        Ok(self.rows.read().await.get(policy_id).cloned())
    }

    async fn update(&self, policy: PolicyRecord) -> Result<(), AppError> {
        self.rows.write().await.insert(policy.policy_id.clone(), policy);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PolicyRecord>, AppError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
