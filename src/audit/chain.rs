use std::sync::Arc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, warn};

use super::canonical::{entry_hash, CanonicalFields};
use crate::clock::Clock;
use crate::domain::AuditEntry;
use crate::error::AppError;
use crate::stores::{AuditRepository, InsertOutcome};

/// The fields a caller supplies for one event; the engine fills in
/// `chain_index`, `prev_hash`, `created_at`, and `event_id`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub actor_key_id: Option<String>,
    pub actor_role: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
}

impl NewEvent {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            actor_key_id: None,
            actor_role: None,
            status: None,
            reason: None,
        }
    }

    pub fn resource_id(mut self, v: impl Into<String>) -> Self {
        self.resource_id = Some(v.into());
        self
    }

    pub fn actor(mut self, key_id: Option<String>, role: Option<String>) -> Self {
        self.actor_key_id = key_id;
        self.actor_role = role;
        self
    }

    pub fn status(mut self, v: impl Into<String>) -> Self {
        self.status = Some(v.into());
        self
    }

    pub fn reason(mut self, v: impl Into<String>) -> Self {
        self.reason = Some(v.into());
        self
    }
}

/// Append-only, hash-linked audit chain. A single in-process mutex guards
/// the read-cursor/compute/insert critical section as an optimization layer
/// on top of the logical uniqueness contract the repository enforces
/// (spec.md §5) — the repository's `try_insert` is what actually decides
/// conflicts, so this is safe even against other writer processes.
pub struct AuditChainEngine {
    repo: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
    retry_limit: u32,
    write_lock: Mutex<()>,
}

impl AuditChainEngine {
    pub fn new(repo: Arc<dyn AuditRepository>, clock: Arc<dyn Clock>, retry_limit: u32) -> Self {
        Self {
            repo,
            clock,
            retry_limit,
            write_lock: Mutex::new(()),
        }
    }

    /// Fail-secure append: backup events, restore events, admin actions,
    /// policy decisions, authorization denials, MFA outcomes. Propagates
    /// `AuditWriteError` on exhausted retries or repository I/O failure.
    pub async fn append(&self, event: NewEvent) -> Result<AuditEntry, AppError> {
        let _guard = self.write_lock.lock().await;

        for attempt in 0..self.retry_limit {
            let (last_index, last_hash) = self.repo.cursor().await?;
            let chain_index = last_index + 1;
            let created_at = self.clock.now();
            let event_id = self.clock.new_id();

            let fields = CanonicalFields {
                chain_index,
                prev_hash: last_hash.clone(),
                created_at,
                event_id: event_id.clone(),
                action: event.action.clone(),
                resource: event.resource.clone(),
                resource_id: event.resource_id.clone(),
                actor_key_id: event.actor_key_id.clone(),
                actor_role: event.actor_role.clone(),
                status: event.status.clone(),
                reason: event.reason.clone(),
            };
            let hash = entry_hash(&fields);

            let entry = AuditEntry {
                chain_index,
                prev_hash: last_hash,
                entry_hash: hash,
                created_at,
                event_id,
                action: event.action.clone(),
                resource: event.resource.clone(),
                resource_id: event.resource_id.clone(),
                actor_key_id: event.actor_key_id.clone(),
                actor_role: event.actor_role.clone(),
                status: event.status.clone(),
                reason: event.reason.clone(),
            };

            match self.repo.try_insert(entry.clone()).await? {
                InsertOutcome::Inserted => return Ok(entry),
                InsertOutcome::Conflict => {
                    warn!(attempt, action = %event.action, "audit append conflict, retrying");
                    continue;
                }
            }
        }

        error!(action = %event.action, "audit append exhausted retries");
        Err(AppError::AuditWriteError {
            message: format!(
                "failed to append audit entry for '{}' after {} attempts",
                event.action, self.retry_limit
            ),
        })
    }

    /// Best-effort append for authentication telemetry: swallow and log,
    /// never raise (spec.md §4.1 "fail-secure vs best-effort").
    pub async fn append_best_effort(&self, event: NewEvent) {
        if let Err(e) = self.append(event).await {
            warn!(error = %e, "best-effort audit append failed, continuing");
        }
    }

    pub async fn page(&self, offset: u64, limit: u64) -> Result<Vec<AuditEntry>, AppError> {
        self.repo.page(offset, limit).await
    }

    pub async fn filter(
        &self,
        action: Option<&str>,
        resource: Option<&str>,
        status: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<AuditEntry>, AppError> {
        self.repo.filter(action, resource, status, offset, limit).await
    }

    pub async fn total_count(&self) -> Result<u64, AppError> {
        self.repo.total_count().await
    }

    pub async fn count_since(
        &self,
        action: &str,
        actor_key_id: Option<&str>,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, AppError> {
        self.repo.count_since(action, actor_key_id, since).await
    }

    /// Scan the whole chain in ascending `chain_index`, recomputing
    /// `entry_hash` for each entry and checking linkage. Never mutates.
    pub async fn validate_chain(&self) -> Result<ChainValidation, AppError> {
        const PAGE_SIZE: u64 = 500;
        let mut offset = 0u64;
        let mut expected_index = 1u64;
        let mut expected_prev_hash: Option<String> = None;
        let mut checked = 0u64;

        loop {
            let page = self.repo.page(offset, PAGE_SIZE).await?;
            if page.is_empty() {
                break;
            }
            for entry in &page {
                if entry.chain_index != expected_index {
                    return Ok(ChainValidation::invalid(
                        checked,
                        entry,
                        ValidationReason::ChainIndexOutOfSequence,
                    ));
                }
                if entry.prev_hash != expected_prev_hash {
                    return Ok(ChainValidation::invalid(
                        checked,
                        entry,
                        ValidationReason::PrevHashMismatch,
                    ));
                }
                let fields = CanonicalFields {
                    chain_index: entry.chain_index,
                    prev_hash: entry.prev_hash.clone(),
                    created_at: entry.created_at,
                    event_id: entry.event_id.clone(),
                    action: entry.action.clone(),
                    resource: entry.resource.clone(),
                    resource_id: entry.resource_id.clone(),
                    actor_key_id: entry.actor_key_id.clone(),
                    actor_role: entry.actor_role.clone(),
                    status: entry.status.clone(),
                    reason: entry.reason.clone(),
                };
                if entry_hash(&fields) != entry.entry_hash {
                    return Ok(ChainValidation::invalid(
                        checked,
                        entry,
                        ValidationReason::EntryHashMismatch,
                    ));
                }

                expected_index += 1;
                expected_prev_hash = Some(entry.entry_hash.clone());
                checked += 1;
            }
            offset += page.len() as u64;
        }

        Ok(ChainValidation {
            valid: true,
            checked_entries: checked,
            failure: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    ChainIndexOutOfSequence,
    PrevHashMismatch,
    EntryHashMismatch,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::ChainIndexOutOfSequence => "chain_index_out_of_sequence",
            ValidationReason::PrevHashMismatch => "prev_hash_mismatch",
            ValidationReason::EntryHashMismatch => "entry_hash_mismatch",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    pub chain_index: u64,
    pub event_id: String,
    pub reason: ValidationReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainValidation {
    pub valid: bool,
    pub checked_entries: u64,
    pub failure: Option<ValidationFailure>,
}

impl ChainValidation {
    fn invalid(checked: u64, entry: &AuditEntry, reason: ValidationReason) -> Self {
        ChainValidation {
            valid: false,
            checked_entries: checked,
            failure: Some(ValidationFailure {
                chain_index: entry.chain_index,
                event_id: entry.event_id.clone(),
                reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::stores::InMemoryAuditRepository;
    use chrono::{TimeZone, Utc};

    fn engine() -> AuditChainEngine {
        let repo = Arc::new(InMemoryAuditRepository::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));
        AuditChainEngine::new(repo, clock, 10)
    }

    #[tokio::test]
    async fn empty_chain_validates() {
        let engine = engine();
        let result = engine.validate_chain().await.unwrap();
        assert!(result.valid);
        assert_eq!(result.checked_entries, 0);
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn sequential_appends_form_valid_chain() {
        let engine = engine();
        for i in 0..5 {
            engine
                .append(NewEvent::new("test_event", "backup").resource_id(format!("b-{i}")))
                .await
                .unwrap();
        }
        let result = engine.validate_chain().await.unwrap();
        assert!(result.valid);
        assert_eq!(result.checked_entries, 5);
    }

    #[tokio::test]
    async fn chain_indices_are_monotonic_and_linked() {
        let engine = engine();
        let e1 = engine.append(NewEvent::new("a", "r")).await.unwrap();
        let e2 = engine.append(NewEvent::new("b", "r")).await.unwrap();
        assert_eq!(e1.chain_index, 1);
        assert_eq!(e2.chain_index, 2);
        assert_eq!(e2.prev_hash, Some(e1.entry_hash));
    }

    #[tokio::test]
    async fn concurrent_appends_produce_gap_free_indices() {
        let engine = Arc::new(engine());
        let mut handles = Vec::new();
        for i in 0..10 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .append(NewEvent::new("concurrent_event", "backup").resource_id(format!("b-{i}")))
                    .await
                    .unwrap()
            }));
        }
        let mut indices: Vec<u64> = Vec::new();
        for h in handles {
            indices.push(h.await.unwrap().chain_index);
        }
        indices.sort();
        assert_eq!(indices, (1..=10).collect::<Vec<_>>());
        let result = engine.validate_chain().await.unwrap();
        assert!(result.valid);
    }
}
