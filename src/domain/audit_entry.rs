use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One link in the hash chain. Never mutated or deleted once appended
/// (spec.md §3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub chain_index: u64,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
    pub created_at: DateTime<Utc>,
    pub event_id: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub actor_key_id: Option<String>,
    pub actor_role: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
}
