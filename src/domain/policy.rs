use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classification::Classification;
use super::principal::Role;

/// A configuration override for the policy engine's defaults — e.g. an
/// operator lockout from SECRET backups for a given department (spec.md
/// §4.7). Stored and administered through `/admin/policies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_id: String,
    pub role: Role,
    pub classification: Classification,
    pub department: Option<String>,
    pub backup_allowed: bool,
    pub restore_allowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
