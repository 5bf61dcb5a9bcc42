use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::IncidentState;
use crate::error::AppError;

/// Append-only incident-level history (spec.md §3).
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    async fn append(&self, state: IncidentState) -> Result<(), AppError>;
    /// Latest row by `changed_at`, or `None` for an empty history.
    async fn current(&self) -> Result<Option<IncidentState>, AppError>;
}

#[derive(Default)]
pub struct InMemoryIncidentRepository {
    history: Arc<RwLock<Vec<IncidentState>>>,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn append(&self, state: IncidentState) -> Result<(), AppError> {
        self.history.write().await.push(state);
        Ok(())
    }

    async fn current(&self) -> Result<Option<IncidentState>, AppError> {
        Ok(self.history.read().await.last().cloned())
    }
}
