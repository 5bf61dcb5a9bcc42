//! `POST /restores` and `GET /restores/access/{token}` (spec.md §6, §4.3,
//! §4.5).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, MfaHeader, RequestId};
use crate::error::AppError;
use crate::pipelines::{RestoreOutcome, RestoreRequest as PipelineRestoreRequest};

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    pub backup_id: String,
    pub mfa_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DryRunQuery {
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn restore(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    MfaHeader(mfa_header): MfaHeader,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<DryRunQuery>,
    Json(body): Json<RestoreBody>,
) -> Response {
    let result = handle(&state, api_key, mfa_header, client_ip, query, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle(
    state: &AppState,
    api_key: Option<String>,
    mfa_header: Option<String>,
    client_ip: Option<String>,
    query: DryRunQuery,
    body: RestoreBody,
) -> Result<RestoreOutcome, AppError> {
    let principal = state
        .auth
        .resolve_principal(api_key.as_deref(), client_ip.as_deref())
        .await?;

    let request = PipelineRestoreRequest {
        backup_id: body.backup_id,
        mfa_token: body.mfa_token.or(mfa_header),
        dry_run: query.dry_run,
    };

    state.restore_pipeline.restore(&principal, request, client_ip.as_deref()).await
}

#[derive(Debug, Serialize)]
struct RestoreAccessGranted {
    status: &'static str,
    backup_id: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

pub async fn redeem_access(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(token): Path<String>,
) -> Response {
    let result = redeem(&state, api_key, client_ip, token).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn redeem(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    token: String,
) -> Result<RestoreAccessGranted, AppError> {
    let principal = match &api_key {
        Some(k) => Some(state.auth.resolve_principal(Some(k), client_ip.as_deref()).await?),
        None => None,
    };

    let (backup_id, expires_at) = state
        .restore_tokens
        .redeem(&token, principal.as_ref().map(|p| p.key_id.as_str()))
        .await?;

    Ok(RestoreAccessGranted {
        status: "restore_access_granted",
        backup_id,
        expires_at,
    })
}
