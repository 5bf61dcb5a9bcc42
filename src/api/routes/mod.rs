//! Route groups, one module per entry in spec.md §6's table.

mod admin;
mod audit;
mod backups;
mod health;
mod restores;

use axum::routing::{get, post, put};
use axum::Router;

use crate::api::AppState;
use crate::domain::Principal;
use crate::error::AppError;
use crate::services::Permission;

/// Resolve the caller's principal and require `permission`, in one step —
/// every `/admin/*` handler and the restore routes start here.
pub(crate) async fn authenticated(
    state: &AppState,
    api_key: Option<&str>,
    client_ip: Option<&str>,
    permission: Permission,
) -> Result<Principal, AppError> {
    let principal = state.auth.resolve_principal(api_key, client_ip).await?;
    let decision = state.policy.authorize(Some(&principal), permission);
    if !decision.allowed {
        return Err(AppError::Authorization {
            message: decision.reason,
            reason_category: decision.reason_category,
        });
    }
    Ok(principal)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/backups", post(backups::submit))
        .route("/restores", post(restores::restore))
        .route("/restores/access/:token", get(restores::redeem_access))
        .route("/audit/chain/validate", get(audit::validate_chain))
        .route("/audit/entries", get(audit::list_entries))
        .route("/audit/summary", get(audit::summary))
        .route("/admin/incident", get(admin::incident::get).put(admin::incident::update))
        .route("/admin/alerts", get(admin::alerts::list))
        .route("/admin/alerts/:id/status", put(admin::alerts::set_status))
        .route("/admin/keys", get(admin::keys::list).post(admin::keys::create))
        .route("/admin/keys/:id/revoke", post(admin::keys::revoke))
        .route("/admin/keys/versions", get(admin::key_versions::list).post(admin::key_versions::rotate))
        .route("/admin/keys/versions/:id", get(admin::key_versions::get))
        .route(
            "/admin/keys/versions/:id/crypto-shred",
            post(admin::key_versions::crypto_shred),
        )
        .route(
            "/admin/keys/versions/:id/crypto-shred-outcome",
            get(admin::key_versions::crypto_shred_outcome),
        )
        .route("/admin/policies", get(admin::policies::list).post(admin::policies::create))
        .route("/admin/policies/:id", get(admin::policies::get).put(admin::policies::update))
}
