//! `GET/POST /admin/keys/versions`, `/{id}`, `/{id}/crypto-shred[-outcome]`
//! (spec.md §6, §4.4).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::routes::authenticated;
use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, MfaHeader, RequestId};
use crate::audit::NewEvent;
use crate::domain::{KeyVersion, Principal, Role};
use crate::error::AppError;
use crate::services::{CryptoShredOutcome, Permission};

pub async fn list(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
) -> Response {
    let result = handle_list(&state, api_key, client_ip).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_list(state: &AppState, api_key: Option<String>, client_ip: Option<String>) -> Result<Vec<KeyVersion>, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    state.key_versions.list().await
}

pub async fn get(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(version_id): Path<String>,
) -> Response {
    let result = handle_get(&state, api_key, client_ip, version_id).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_get(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    version_id: String,
) -> Result<KeyVersion, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    state.key_versions.get(&version_id).await?.ok_or_else(|| AppError::NotFound {
        message: format!("key version {version_id} not found"),
        code: "KEY_VERSION_NOT_FOUND",
    })
}

#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub version_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct RotateResult {
    outcome: &'static str,
    active_version: String,
}

pub async fn rotate(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<RotateRequest>,
) -> Response {
    let result = handle_rotate(&state, api_key, client_ip, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_rotate(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    body: RotateRequest,
) -> Result<RotateResult, AppError> {
    let actor = authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    let outcome = state
        .key_management
        .rotate_active_version(&body.version_id, &actor, body.reason, client_ip.as_deref())
        .await?;
    use crate::services::RotationOutcome;
    Ok(RotateResult {
        outcome: match outcome {
            RotationOutcome::Rotated => "rotated",
            RotationOutcome::NoStateChange => "no_state_change",
        },
        active_version: body.version_id,
    })
}

#[derive(Debug, Deserialize)]
pub struct CryptoShredRequest {
    pub confirmation: String,
    pub mfa_token: Option<String>,
}

/// Destructive: requires super-admin, the exact confirmation phrase
/// `"DESTROY {version_id}"`, and valid MFA — none of which
/// `KeyManagementService::execute_crypto_shred` checks itself
/// (see its own doc comment; this handler is where those preconditions live).
pub async fn crypto_shred(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    MfaHeader(mfa_header): MfaHeader,
    ClientIp(client_ip): ClientIp,
    Path(version_id): Path<String>,
    Json(body): Json<CryptoShredRequest>,
) -> Response {
    let result = handle_crypto_shred(&state, api_key, mfa_header, client_ip, version_id, body).await;
    respond(&request_id, StatusCode::OK, result)
}

/// Audit `crypto_shred_denied` for a failed precondition, then return the
/// denial as the caller's error (spec.md §4.4: all three precondition
/// checks audit `crypto_shred_denied` on failure).
async fn deny_crypto_shred(
    state: &AppState,
    version_id: &str,
    actor: &Principal,
    message: impl Into<String>,
    reason_category: impl Into<String>,
) -> AppError {
    let reason_category = reason_category.into();
    let _ = state
        .audit
        .append(
            NewEvent::new("crypto_shred_denied", "key_version")
                .resource_id(version_id)
                .actor(Some(actor.key_id.clone()), Some(actor.role.to_string()))
                .reason(reason_category.clone()),
        )
        .await;
    AppError::CryptoShredDenied {
        message: message.into(),
        reason_category,
    }
}

async fn handle_crypto_shred(
    state: &AppState,
    api_key: Option<String>,
    mfa_header: Option<String>,
    client_ip: Option<String>,
    version_id: String,
    body: CryptoShredRequest,
) -> Result<CryptoShredOutcome, AppError> {
    let actor = authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    if actor.role != Role::SuperAdmin {
        return Err(deny_crypto_shred(
            state,
            &version_id,
            &actor,
            "crypto-shred requires the super_admin role",
            "insufficient_role",
        )
        .await);
    }

    let expected_confirmation = format!("DESTROY {version_id}");
    if body.confirmation != expected_confirmation {
        return Err(deny_crypto_shred(
            state,
            &version_id,
            &actor,
            "confirmation phrase does not match",
            "missing_confirmation",
        )
        .await);
    }

    let mfa_token = body.mfa_token.or(mfa_header);
    if let Err(mfa_err) = state.auth.validate_mfa_token(&actor, mfa_token.as_deref(), client_ip.as_deref()).await {
        return Err(deny_crypto_shred(state, &version_id, &actor, mfa_err.message(), mfa_err.reason_category()).await);
    }

    state.key_management.execute_crypto_shred(&version_id, &actor).await
}

#[derive(Debug, Serialize)]
struct CryptoShredOutcomeView {
    version_id: String,
    destroyed: bool,
    destroyed_at: Option<chrono::DateTime<chrono::Utc>>,
    affected_backups: u64,
}

pub async fn crypto_shred_outcome(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(version_id): Path<String>,
) -> Response {
    let result = handle_outcome(&state, api_key, client_ip, version_id).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_outcome(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    version_id: String,
) -> Result<CryptoShredOutcomeView, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    let version = state.key_versions.get(&version_id).await?.ok_or_else(|| AppError::NotFound {
        message: format!("key version {version_id} not found"),
        code: "KEY_VERSION_NOT_FOUND",
    })?;

    let affected_backups = state
        .backups
        .list_by_key_version(&version_id)
        .await?
        .into_iter()
        .filter(|b| b.irreversible_reason.as_deref() == Some("crypto_shredded"))
        .count() as u64;

    Ok(CryptoShredOutcomeView {
        version_id: version.version_id,
        destroyed: version.is_destroyed,
        destroyed_at: version.destroyed_at,
        affected_backups,
    })
}
