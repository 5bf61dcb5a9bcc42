//! `POST/GET /admin/keys`, `POST /admin/keys/{id}/revoke` (spec.md §6;
//! SPEC_FULL.md §3 "API-key representation").

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::api::routes::authenticated;
use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, RequestId};
use crate::audit::NewEvent;
use crate::domain::{ApiKey, Role};
use crate::error::AppError;
use crate::services::Permission;

const RAW_KEY_BYTES: usize = 32;

fn new_raw_key() -> String {
    let mut bytes = [0u8; RAW_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub role: String,
    pub department: Option<String>,
    pub allowed_ips: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub key_id: String,
    pub key_prefix: String,
    pub role: Role,
    pub department: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ApiKey> for ApiKeyView {
    fn from(key: ApiKey) -> Self {
        ApiKeyView {
            key_id: key.key_id,
            key_prefix: key.key_prefix,
            role: key.role,
            department: key.department,
            created_at: key.created_at,
            revoked_at: key.revoked_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub view: ApiKeyView,
    /// Shown exactly once, at creation (SPEC_FULL.md §3).
    pub api_key: String,
}

pub async fn create(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<CreateApiKeyRequest>,
) -> Response {
    let result = handle_create(&state, api_key, client_ip, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_create(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    body: CreateApiKeyRequest,
) -> Result<CreatedApiKey, AppError> {
    let actor = authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    let role = Role::from_str(&body.role).map_err(|_| AppError::Validation {
        message: "role is not a recognized value".into(),
        reason_category: "invalid_role".into(),
        loc: vec!["body".into(), "role".into()],
    })?;

    let raw_key = new_raw_key();
    let key_hash = hex::encode(Sha512::digest(raw_key.as_bytes()));
    let key = ApiKey {
        key_id: state.clock.new_id(),
        key_hash,
        key_prefix: raw_key[..8].to_string(),
        role,
        department: body.department,
        created_at: state.clock.now(),
        revoked_at: None,
        allowed_ips: body.allowed_ips,
    };
    state.api_keys.insert(key.clone()).await?;

    state
        .audit
        .append(
            NewEvent::new("api_key_created", "api_key")
                .resource_id(key.key_id.clone())
                .actor(Some(actor.key_id), Some(actor.role.to_string()))
                .status("active"),
        )
        .await?;

    Ok(CreatedApiKey {
        view: ApiKeyView::from(key),
        api_key: raw_key,
    })
}

pub async fn list(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
) -> Response {
    let result = handle_list(&state, api_key, client_ip).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_list(state: &AppState, api_key: Option<String>, client_ip: Option<String>) -> Result<Vec<ApiKeyView>, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    let keys = state.api_keys.list().await?;
    Ok(keys.into_iter().map(ApiKeyView::from).collect())
}

pub async fn revoke(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(key_id): Path<String>,
) -> Response {
    let result = handle_revoke(&state, api_key, client_ip, key_id).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_revoke(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    key_id: String,
) -> Result<ApiKeyView, AppError> {
    let actor = authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    let mut key = state.api_keys.get_by_id(&key_id).await?.ok_or_else(|| AppError::NotFound {
        message: format!("api key {key_id} not found"),
        code: "API_KEY_NOT_FOUND",
    })?;
    key.revoked_at = Some(state.clock.now());
    state.api_keys.update(key.clone()).await?;

    state
        .audit
        .append(
            NewEvent::new("api_key_revoked", "api_key")
                .resource_id(key_id)
                .actor(Some(actor.key_id), Some(actor.role.to_string()))
                .status("revoked"),
        )
        .await?;

    Ok(ApiKeyView::from(key))
}
