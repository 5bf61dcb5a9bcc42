//! `GET /admin/alerts`, `PUT /admin/alerts/{id}/status` (spec.md §6, §4.8).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::api::routes::authenticated;
use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, RequestId};
use crate::domain::{Alert, AlertSeverity, AlertStatus};
use crate::error::AppError;
use crate::services::Permission;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<AlertsQuery>,
) -> Response {
    let result = handle_list(&state, api_key, client_ip, query).await;
    respond(&request_id, StatusCode::OK, result)
}

fn parse_status(raw: &str) -> Result<AlertStatus, AppError> {
    match raw {
        "OPEN" => Ok(AlertStatus::Open),
        "ACKNOWLEDGED" => Ok(AlertStatus::Acknowledged),
        "RESOLVED" => Ok(AlertStatus::Resolved),
        _ => Err(AppError::Validation {
            message: "status is not a recognized alert status".into(),
            reason_category: "invalid_alert_status".into(),
            loc: vec!["query".into(), "status".into()],
        }),
    }
}

fn parse_severity(raw: &str) -> Result<AlertSeverity, AppError> {
    match raw {
        "LOW" => Ok(AlertSeverity::Low),
        "MEDIUM" => Ok(AlertSeverity::Medium),
        "HIGH" => Ok(AlertSeverity::High),
        _ => Err(AppError::Validation {
            message: "severity is not a recognized alert severity".into(),
            reason_category: "invalid_alert_severity".into(),
            loc: vec!["query".into(), "severity".into()],
        }),
    }
}

async fn handle_list(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    query: AlertsQuery,
) -> Result<Vec<Alert>, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let severity = query.severity.as_deref().map(parse_severity).transpose()?;
    state.monitoring.list_alerts(status, severity).await
}

#[derive(Debug, Deserialize)]
pub struct AlertStatusUpdate {
    pub status: String,
}

pub async fn set_status(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(alert_id): Path<String>,
    Json(body): Json<AlertStatusUpdate>,
) -> Response {
    let result = handle_set_status(&state, api_key, client_ip, alert_id, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_set_status(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    alert_id: String,
    body: AlertStatusUpdate,
) -> Result<Alert, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    let target = parse_status(&body.status)?;
    state.monitoring.set_alert_status(&alert_id, target).await
}
