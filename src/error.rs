//! Central error type. Every fallible core operation returns `AppError` so
//! the HTTP boundary can map `reason_category` onto the codes of spec.md §6
//! without the pipelines knowing anything about HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        reason_category: String,
        loc: Vec<String>,
    },

    #[error("authentication error: {message}")]
    Authentication {
        message: String,
        reason_category: String,
    },

    #[error("mfa error: {message}")]
    Mfa {
        message: String,
        reason_category: String,
    },

    #[error("authorization denied: {message}")]
    Authorization {
        message: String,
        reason_category: String,
    },

    #[error("incident restricted: {reason_category}")]
    IncidentRestricted { reason_category: String },

    #[error("backup is irreversible: {reason_category}")]
    Irreversible { reason_category: String },

    #[error("integrity check failed")]
    Integrity,

    #[error("resource not found: {message}")]
    NotFound { message: String, code: &'static str },

    #[error("downstream execution unavailable: {message}")]
    ExecutionUnavailable {
        message: String,
        reason_category: String,
    },

    #[error("audit write conflict: {message}")]
    AuditWriteError { message: String },

    #[error("backup submission failed: {message}")]
    UploadFailed {
        message: String,
        reason_category: String,
    },

    #[error("invalid state transition: {message}")]
    StateError {
        message: String,
        reason_category: String,
    },

    #[error("restore token error: {message}")]
    RestoreToken {
        message: String,
        reason_category: String,
    },

    #[error("crypto-shred denied: {message}")]
    CryptoShredDenied {
        message: String,
        reason_category: String,
    },
}

impl AppError {
    /// The caller-facing message, verbatim — unlike `to_string()` (which
    /// goes through `thiserror`'s `#[error(...)]` template and prepends a
    /// category prefix), this is exactly what spec.md's boundary messages
    /// require.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::Authentication { message, .. } => message.clone(),
            AppError::Mfa { message, .. } => message.clone(),
            AppError::Authorization { message, .. } => message.clone(),
            AppError::IncidentRestricted { reason_category } => {
                format!("restore restricted by incident state: {reason_category}")
            }
            AppError::Irreversible { .. } => "backup is irreversible".to_string(),
            AppError::Integrity => "integrity check failed".to_string(),
            AppError::NotFound { message, .. } => message.clone(),
            AppError::ExecutionUnavailable { message, .. } => message.clone(),
            AppError::AuditWriteError { message } => message.clone(),
            AppError::UploadFailed { message, .. } => message.clone(),
            AppError::StateError { message, .. } => message.clone(),
            AppError::RestoreToken { message, .. } => message.clone(),
            AppError::CryptoShredDenied { message, .. } => message.clone(),
        }
    }

    pub fn reason_category(&self) -> &str {
        match self {
            AppError::Validation { reason_category, .. } => reason_category,
            AppError::Authentication { reason_category, .. } => reason_category,
            AppError::Mfa { reason_category, .. } => reason_category,
            AppError::Authorization { reason_category, .. } => reason_category,
            AppError::IncidentRestricted { reason_category } => reason_category,
            AppError::Irreversible { reason_category } => reason_category,
            AppError::Integrity => "integrity_failed",
            AppError::NotFound { .. } => "not_found",
            AppError::ExecutionUnavailable { reason_category, .. } => reason_category,
            AppError::AuditWriteError { .. } => "audit_write_error",
            AppError::UploadFailed { reason_category, .. } => reason_category,
            AppError::StateError { reason_category, .. } => reason_category,
            AppError::RestoreToken { reason_category, .. } => reason_category,
            AppError::CryptoShredDenied { reason_category, .. } => reason_category,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Authentication { reason_category, .. } => match reason_category.as_str() {
                "missing_key" => "AUTH_INVALID_KEY",
                "auth_unavailable" => "AUTH_UNAVAILABLE",
                _ => "AUTH_INVALID_KEY",
            },
            AppError::Mfa { reason_category, .. } => {
                if reason_category == "mfa_required" {
                    "MFA_REQUIRED"
                } else {
                    "MFA_INVALID"
                }
            }
            AppError::Authorization { .. } => "POLICY_DENIED",
            AppError::IncidentRestricted { reason_category } => {
                if reason_category == "incident_quarantine" {
                    "RESTORE_RESTRICTED"
                } else {
                    "RESTORE_RESTRICTED"
                }
            }
            AppError::Irreversible { .. } => "RESTORE_IRREVERSIBLE",
            AppError::Integrity => "RESTORE_INTEGRITY_FAILED",
            AppError::NotFound { code, .. } => code,
            AppError::ExecutionUnavailable { .. } => "RESTORE_UNAVAILABLE",
            AppError::AuditWriteError { .. } => "UPLOAD_FAILED",
            AppError::UploadFailed { .. } => "UPLOAD_FAILED",
            AppError::StateError { reason_category, .. } => match reason_category.as_str() {
                "incident_state_unavailable" => "RESTORE_UNAVAILABLE",
                "invalid_transition" => "INCIDENT_TRANSITION_INVALID",
                "alert_status_invalid" => "ALERT_STATUS_INVALID",
                "key_rotation_invalid" => "KEY_ROTATION_INVALID",
                _ => "STATE_ERROR",
            },
            AppError::RestoreToken { reason_category, .. } => match reason_category.as_str() {
                "token_expired" => "RESTORE_TOKEN_EXPIRED",
                "token_forbidden" => "RESTORE_TOKEN_FORBIDDEN",
                _ => "RESTORE_TOKEN_INVALID",
            },
            AppError::CryptoShredDenied { .. } => "CRYPTO_SHRED_DENIED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Authentication { reason_category, .. } => {
                if reason_category == "auth_unavailable" {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }
            AppError::Mfa { .. } => StatusCode::UNAUTHORIZED,
            AppError::Authorization { .. } => StatusCode::FORBIDDEN,
            AppError::IncidentRestricted { reason_category } => {
                if reason_category == "incident_lockdown" {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::FORBIDDEN
                }
            }
            AppError::Irreversible { .. } => StatusCode::GONE,
            AppError::Integrity => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ExecutionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AuditWriteError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UploadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StateError { .. } => StatusCode::BAD_REQUEST,
            AppError::RestoreToken { reason_category, .. } => {
                if reason_category == "token_forbidden" {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }
            AppError::CryptoShredDenied { reason_category, .. } => {
                if reason_category == "key_not_found" || reason_category == "already_destroyed" {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::FORBIDDEN
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.message();
        tracing::warn!(code, %message, "request failed");
        let body = json!({
            "data": null,
            "meta": { "request_id": uuid::Uuid::new_v4().to_string() },
            "error": { "code": code, "message": message },
        });
        (status, Json(body)).into_response()
    }
}
