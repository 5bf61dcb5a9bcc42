//! `GET/PUT /admin/incident` (spec.md §6, §4.6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::routes::authenticated;
use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, RequestId};
use crate::domain::IncidentLevel;
use crate::error::AppError;
use crate::services::Permission;

#[derive(Debug, Serialize)]
struct IncidentView {
    level: IncidentLevel,
    changed_by_key_id: Option<String>,
    reason: Option<String>,
    changed_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn get(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
) -> Response {
    let result = handle_get(&state, api_key, client_ip).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_get(state: &AppState, api_key: Option<String>, client_ip: Option<String>) -> Result<IncidentView, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    let current = state.incident.current_state().await?;
    Ok(match current {
        Some(s) => IncidentView {
            level: s.level,
            changed_by_key_id: s.changed_by_key_id,
            reason: s.reason,
            changed_at: Some(s.changed_at),
        },
        None => IncidentView {
            level: IncidentLevel::Normal,
            changed_by_key_id: None,
            reason: None,
            changed_at: None,
        },
    })
}

#[derive(Debug, Deserialize)]
pub struct IncidentUpdate {
    pub level: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct IncidentTransitionResult {
    outcome: &'static str,
    level: IncidentLevel,
}

pub async fn update(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<IncidentUpdate>,
) -> Response {
    let result = handle_update(&state, api_key, client_ip, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_update(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    body: IncidentUpdate,
) -> Result<IncidentTransitionResult, AppError> {
    let principal = authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    let target = IncidentLevel::from_str(&body.level).map_err(|_| AppError::Validation {
        message: "level is not a recognized incident level".into(),
        reason_category: "invalid_incident_level".into(),
        loc: vec!["body".into(), "level".into()],
    })?;

    let outcome = state
        .incident
        .transition(target, Some(principal.key_id.clone()), body.reason)
        .await?;

    Ok(IncidentTransitionResult {
        outcome: outcome.as_str(),
        level: target,
    })
}
