use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle metadata for one key version. Raw key bytes live in the
/// key-material store (`crate::stores::KeyMaterialStore`); this record is
/// the audit/lifecycle side of the same version id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVersion {
    pub version_id: String,
    pub is_active: bool,
    pub is_destroyed: bool,
    pub rotated_from_version: Option<String>,
    pub created_by_key_id: Option<String>,
    pub rotation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub destroyed_at: Option<DateTime<Utc>>,
}

impl KeyVersion {
    pub fn new(version_id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            version_id,
            is_active: false,
            is_destroyed: false,
            rotated_from_version: None,
            created_by_key_id: None,
            rotation_reason: None,
            created_at,
            activated_at: None,
            destroyed_at: None,
        }
    }
}
