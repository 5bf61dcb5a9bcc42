//! Component services sitting between the stores and the pipelines/API
//! layer: auth/MFA, policy, incident state, key management, restore
//! tokens, and monitoring (spec.md §2, §4.4-§4.8).

mod auth;
mod incident;
mod key_management;
mod monitoring;
mod policy;
mod restore_tokens;

pub use auth::AuthService;
pub use incident::{IncidentService, TransitionOutcome};
pub use key_management::{CryptoShredOutcome, KeyManagementService, RotationOutcome};
pub use monitoring::MonitoringService;
pub use policy::{Decision, PolicyEngine, Permission};
pub use restore_tokens::RestoreAccessTokenService;
