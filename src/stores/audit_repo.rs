use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::AuditEntry;
use crate::error::AppError;

/// Outcome of a single insert attempt — the audit engine retries on
/// `Conflict`, per spec.md §4.1's bounded-retry append protocol.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Conflict,
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// The current chain cursor: `(last_index, last_hash)`, or `(0, None)`
    /// for an empty chain.
    async fn cursor(&self) -> Result<(u64, Option<String>), AppError>;

    /// Attempt to insert one entry. Must behave as if backed by unique
    /// indices on `chain_index` and `entry_hash` — a losing concurrent
    /// writer observes `Conflict`, never a partial write.
    async fn try_insert(&self, entry: AuditEntry) -> Result<InsertOutcome, AppError>;

    /// Ascending page of entries by `chain_index`, for `validate_chain()`
    /// and the `/audit/entries` listing.
    async fn page(&self, offset: u64, limit: u64) -> Result<Vec<AuditEntry>, AppError>;

    async fn filter(
        &self,
        action: Option<&str>,
        resource: Option<&str>,
        status: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<AuditEntry>, AppError>;

    /// Count matching `action` entries for `actor_key_id` (or anonymous)
    /// since `since`, for the monitoring sliding window (spec.md §4.8).
    async fn count_since(
        &self,
        action: &str,
        actor_key_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    async fn total_count(&self) -> Result<u64, AppError>;
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn cursor(&self) -> Result<(u64, Option<String>), AppError> {
        let entries = self.entries.read().await;
        match entries.last() {
            Some(e) => Ok((e.chain_index, Some(e.entry_hash.clone()))),
            None => Ok((0, None)),
        }
    }

    async fn try_insert(&self, entry: AuditEntry) -> Result<InsertOutcome, AppError> {
        let mut entries = self.entries.write().await;
        let conflict = entries
            .iter()
            .any(|e| e.chain_index == entry.chain_index || e.entry_hash == entry.entry_hash);
        if conflict {
            return Ok(InsertOutcome::Conflict);
        }
        entries.push(entry);
        Ok(InsertOutcome::Inserted)
    }

    async fn page(&self, offset: u64, limit: u64) -> Result<Vec<AuditEntry>, AppError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn filter(
        &self,
        action: Option<&str>,
        resource: Option<&str>,
        status: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<AuditEntry>, AppError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| action.map(|a| e.action == a).unwrap_or(true))
            .filter(|e| resource.map(|r| e.resource == r).unwrap_or(true))
            .filter(|e| status.map(|s| e.status.as_deref() == Some(s)).unwrap_or(true))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_since(
        &self,
        action: &str,
        actor_key_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.action == action)
            .filter(|e| e.actor_key_id.as_deref() == actor_key_id)
            .filter(|e| e.created_at >= since)
            .count() as u64)
    }

    async fn total_count(&self) -> Result<u64, AppError> {
        Ok(self.entries.read().await.len() as u64)
    }
}
