//! `GET/POST /admin/policies`, `GET/PUT /admin/policies/{id}` (spec.md §6,
//! §4.7 policy overrides).

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::api::routes::authenticated;
use crate::api::{respond, ApiKeyHeader, AppState, ClientIp, RequestId};
use crate::domain::{Classification, PolicyRecord, Role};
use crate::error::AppError;
use crate::services::Permission;

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub role: String,
    pub classification: String,
    pub department: Option<String>,
    pub backup_allowed: bool,
    pub restore_allowed: bool,
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    Role::from_str(raw).map_err(|_| AppError::Validation {
        message: "role is not a recognized value".into(),
        reason_category: "invalid_role".into(),
        loc: vec!["body".into(), "role".into()],
    })
}

fn parse_classification(raw: &str) -> Result<Classification, AppError> {
    Classification::from_str(raw).map_err(|_| AppError::Validation {
        message: "classification is not a recognized value".into(),
        reason_category: "invalid_classification".into(),
        loc: vec!["body".into(), "classification".into()],
    })
}

pub async fn create(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<CreatePolicyRequest>,
) -> Response {
    let result = handle_create(&state, api_key, client_ip, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_create(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    body: CreatePolicyRequest,
) -> Result<PolicyRecord, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    let policy = PolicyRecord {
        policy_id: state.clock.new_id(),
        role: parse_role(&body.role)?,
        classification: parse_classification(&body.classification)?,
        department: body.department,
        backup_allowed: body.backup_allowed,
        restore_allowed: body.restore_allowed,
        created_at: state.clock.now(),
        updated_at: None,
    };
    state.policies.insert(policy.clone()).await?;
    Ok(policy)
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

async fn handle_list(state: &AppState, api_key: Option<String>, client_ip: Option<String>) -> Result<Vec<PolicyRecord>, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    state.policies.list().await
}

pub async fn get(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(policy_id): Path<String>,
) -> Response {
    let result = handle_get(&state, api_key, client_ip, policy_id).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_get(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    policy_id: String,
) -> Result<PolicyRecord, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;
    state.policies.get(&policy_id).await?.ok_or_else(|| AppError::NotFound {
        message: format!("policy {policy_id} not found"),
        code: "POLICY_NOT_FOUND",
    })
}

#[derive(Debug, Deserialize)]
pub struct UpdatePolicyRequest {
    pub classification: Option<String>,
    pub department: Option<String>,
    pub backup_allowed: Option<bool>,
    pub restore_allowed: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ApiKeyHeader(api_key): ApiKeyHeader,
    ClientIp(client_ip): ClientIp,
    Path(policy_id): Path<String>,
    Json(body): Json<UpdatePolicyRequest>,
) -> Response {
    let result = handle_update(&state, api_key, client_ip, policy_id, body).await;
    respond(&request_id, StatusCode::OK, result)
}

async fn handle_update(
    state: &AppState,
    api_key: Option<String>,
    client_ip: Option<String>,
    policy_id: String,
    body: UpdatePolicyRequest,
) -> Result<PolicyRecord, AppError> {
    authenticated(state, api_key.as_deref(), client_ip.as_deref(), Permission::Admin).await?;

    let mut policy = state.policies.get(&policy_id).await?.ok_or_else(|| AppError::NotFound {
        message: format!("policy {policy_id} not found"),
        code: "POLICY_NOT_FOUND",
    })?;

    if let Some(classification) = body.classification {
        policy.classification = parse_classification(&classification)?;
    }
    if let Some(department) = body.department {
        policy.department = Some(department);
    }
    if let Some(backup_allowed) = body.backup_allowed {
        policy.backup_allowed = backup_allowed;
    }
    if let Some(restore_allowed) = body.restore_allowed {
        policy.restore_allowed = restore_allowed;
    }
    policy.updated_at = Some(state.clock.now());

    state.policies.update(policy.clone()).await?;
    Ok(policy)
}
