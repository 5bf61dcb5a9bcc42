//! Capability interfaces for every collaborator the core depends on, plus
//! in-memory implementations. Production backings (Postgres via `sqlx`, a
//! real object store) implement the same traits; only the in-memory doubles
//! ship here since DB/object-store driver details are out of scope
//! (spec.md §1).

mod alerts_repo;
mod api_keys_repo;
mod audit_repo;
mod backups_repo;
mod blob_store;
mod incident_repo;
mod key_material_store;
mod key_versions_repo;
mod policies_repo;

pub use alerts_repo::{AlertsRepository, InMemoryAlertsRepository};
pub use api_keys_repo::{ApiKeysRepository, InMemoryApiKeysRepository};
pub use audit_repo::{AuditRepository, InMemoryAuditRepository, InsertOutcome};
pub use backups_repo::{BackupsRepository, InMemoryBackupsRepository};
pub use blob_store::{BlobStore, InMemoryBlobStore};
pub use incident_repo::{InMemoryIncidentRepository, IncidentRepository};
pub use key_material_store::{InMemoryKeyMaterialStore, KeyMaterialStore};
pub use key_versions_repo::{InMemoryKeyVersionsRepository, KeyVersionsRepository};
pub use policies_repo::{InMemoryPoliciesRepository, PoliciesRepository};
