//! `POST /backups` (spec.md §6, §4.2).

use std::str::FromStr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, RequestId};
use crate::domain::Classification;
use crate::error::AppError;
use crate::pipelines::{BackupAccepted, BackupRequest};

#[derive(Debug, Deserialize)]
pub struct SubmitBackupRequest {
    pub classification: Option<String>,
    pub source_system: String,
    pub description: Option<String>,
    /// Base64-encoded payload bytes; omitted means an empty payload
    /// (spec.md §4.2 — `payload?` is optional, ≤ 1 MB).
    pub payload: Option<String>,
}

pub async fn submit(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<SubmitBackupRequest>,
) -> Response {
    let result = handle(&state, api_key, client_ip, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    body: SubmitBackupRequest,
) -> Result<BackupAccepted, AppError> {
    let principal = match &api_key {
        Some(k) => Some(state.auth.resolve_principal(Some(k), client_ip.as_deref()).await?),
        None => None,
    };

    let classification = body
        .classification
        .as_deref()
        .map(Classification::from_str)
        .transpose()
        .map_err(|_| AppError::Validation {
            message: "classification is not a recognized value".into(),
            reason_category: "invalid_classification".into(),
            loc: vec!["body".into(), "classification".into()],
        })?;

    let payload = match &body.payload {
        Some(encoded) => STANDARD.decode(encoded).map_err(|_| AppError::Validation {
            message: "payload is not valid base64".into(),
            reason_category: "invalid_payload_encoding".into(),
            loc: vec!["body".into(), "payload".into()],
        })?,
        None => Vec::new(),
    };

    let request = BackupRequest {
        classification,
        source_system: body.source_system,
        description: body.description,
        payload,
    };

    state.backup_pipeline.submit(principal.as_ref(), request, client_ip.as_deref()).await
}
