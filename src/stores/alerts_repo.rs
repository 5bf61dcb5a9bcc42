use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{Alert, AlertSeverity, AlertStatus};
use crate::error::AppError;

#[async_trait]
pub trait AlertsRepository: Send + Sync {
    async fn get_by_dedupe_key(&self, dedupe_key: &str) -> Result<Option<Alert>, AppError>;
    async fn insert(&self, alert: Alert) -> Result<(), AppError>;
    async fn get(&self, alert_id: &str) -> Result<Option<Alert>, AppError>;
    async fn update(&self, alert: Alert) -> Result<(), AppError>;
    async fn list(
        &self,
        status: Option<AlertStatus>,
        severity: Option<AlertSeverity>,
    ) -> Result<Vec<Alert>, AppError>;
}

#[derive(Default)]
pub struct InMemoryAlertsRepository {
    rows: Arc<RwLock<HashMap<String, Alert>>>,
}

impl InMemoryAlertsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertsRepository for InMemoryAlertsRepository {
    async fn get_by_dedupe_key(&self, dedupe_key: &str) -> Result<Option<Alert>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|a| a.dedupe_key == dedupe_key)
            .cloned())
    }

    async fn insert(&self, alert: Alert) -> Result<(), AppError> {
        self.rows.write().await.insert(alert.alert_id.clone(), alert);
        Ok(())
    }

    async fn get(&self, alert_id: &str) -> Result<Option<Alert>, AppError> {
        Ok(self.rows.read().await.get(alert_id).cloned())
    }

    async fn update(&self, alert: Alert) -> Result<(), AppError> {
        self.rows.write().await.insert(alert.alert_id.clone(), alert);
        Ok(())
    }

    async fn list(
        &self,
        status: Option<AlertStatus>,
        severity: Option<AlertSeverity>,
    ) -> Result<Vec<Alert>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|a| status.map(|s| a.status == s).unwrap_or(true))
            .filter(|a| severity.map(|s| a.severity == s).unwrap_or(true))
            .cloned()
            .collect())
    }
}
