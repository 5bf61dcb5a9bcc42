use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classification::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Processing,
    Active,
    Failed,
    Irreversible,
}

impl BackupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BackupStatus::Active | BackupStatus::Failed | BackupStatus::Irreversible
        )
    }
}

/// A single backup's metadata row. `storage_path`/`nonce`/checksums are only
/// populated once the submission pipeline reaches ACTIVE (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_id: String,
    pub key_version: Option<String>,
    pub classification: Classification,
    pub source_system: String,
    pub description: Option<String>,
    pub status: BackupStatus,
    pub storage_path: Option<String>,
    pub checksum_plaintext: Option<String>,
    pub checksum_ciphertext: Option<String>,
    pub nonce: Option<String>,
    pub original_size: Option<u64>,
    pub encrypted_size: Option<u64>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub irreversible_reason: Option<String>,
    pub shredded_at: Option<DateTime<Utc>>,
}

impl BackupMetadata {
    pub fn new_processing(
        backup_id: String,
        classification: Classification,
        source_system: String,
        description: Option<String>,
        created_by: Option<String>,
        checksum_plaintext: String,
        original_size: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            backup_id,
            key_version: None,
            classification,
            source_system,
            description,
            status: BackupStatus::Processing,
            storage_path: None,
            checksum_plaintext: Some(checksum_plaintext),
            checksum_ciphertext: None,
            nonce: None,
            original_size: Some(original_size),
            encrypted_size: None,
            created_by,
            created_at,
            irreversible_reason: None,
            shredded_at: None,
        }
    }

    /// Whether this ACTIVE row has all the fields spec.md §3 requires.
    pub fn is_fully_populated_active(&self) -> bool {
        self.status == BackupStatus::Active
            && self.storage_path.is_some()
            && self.key_version.is_some()
            && self.nonce.is_some()
            && self.checksum_plaintext.is_some()
            && self.checksum_ciphertext.is_some()
    }
}
