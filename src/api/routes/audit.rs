//! `GET /audit/chain/validate`, `/audit/entries`, `/audit/summary` (spec.md
//! §6, §4.1).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::api::{respond, AppState, RequestId};
use crate::audit::ChainValidation;
use crate::domain::AuditEntry;
use crate::error::AppError;

fn default_limit() -> u64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct EntriesPage {
    entries: Vec<AuditEntry>,
    offset: u64,
    limit: u64,
    total: u64,
}

pub async fn validate_chain(State(state): State<AppState>, RequestId(request_id): RequestId) -> Response {
    let result: Result<ChainValidation, AppError> = state.audit.validate_chain().await;
    respond(&request_id, StatusCode::OK, result)
}

pub async fn list_entries(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(query): Query<EntriesQuery>,
) -> Response {
    let result = handle_list(&state, query).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_list(state: &AppState, query: EntriesQuery) -> Result<EntriesPage, AppError> {
    let entries = state
        .audit
        .filter(
            query.action.as_deref(),
            query.resource.as_deref(),
            query.status.as_deref(),
            query.offset,
            query.limit,
        )
        .await?;
    let total = state.audit.total_count().await?;
    Ok(EntriesPage {
        entries,
        offset: query.offset,
        limit: query.limit,
        total,
    })
}

#[derive(Debug, Serialize)]
struct AuditSummary {
    valid: bool,
    checked_entries: u64,
    failure: Option<crate::audit::ValidationFailure>,
    total_entries: u64,
}

pub async fn summary(State(state): State<AppState>, RequestId(request_id): RequestId) -> Response {
    let result = handle_summary(&state).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_summary(state: &AppState) -> Result<AuditSummary, AppError> {
    let validation = state.audit.validate_chain().await?;
    let total_entries = state.audit.total_count().await?;
    Ok(AuditSummary {
        valid: validation.valid,
        checked_entries: validation.checked_entries,
        failure: validation.failure,
        total_entries,
    })
}
