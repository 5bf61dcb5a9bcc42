use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single-use, short-TTL restore-access grant (spec.md §4.5). Held only
/// in-process; not persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreAccessTokenRecord {
    pub token: String,
    pub backup_id: String,
    pub actor_key_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
