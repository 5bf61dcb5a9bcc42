//! Process configuration. Loaded once at startup from environment
//! variables, in the teacher's own style (`std::env::var` with a typed
//! `.ok().and_then(|v| v.parse().ok()).unwrap_or(default)` fallback) rather
//! than a config-file layer, since HTTP/config-file loading is out of scope
//! for this core (spec.md §1).

use crate::domain::Classification;
use crate::error::AppError;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub cors_origins: String,
    pub classification_required: bool,
    pub default_classification: Option<String>,
    pub max_payload_bytes: usize,
    pub restore_token_ttl_seconds: i64,
    pub audit_retry_limit: u32,
    pub bucket_name: String,
    pub monitoring_window_minutes: i64,
    pub monitoring_threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cors_origins: std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            classification_required: std::env::var("CLASSIFICATION_REQUIRED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            default_classification: std::env::var("DEFAULT_CLASSIFICATION").ok(),
            max_payload_bytes: std::env::var("MAX_PAYLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_048_576),
            restore_token_ttl_seconds: std::env::var("RESTORE_TOKEN_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            audit_retry_limit: std::env::var("AUDIT_RETRY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            bucket_name: std::env::var("BACKUP_BUCKET").unwrap_or_else(|_| "backups".to_string()),
            monitoring_window_minutes: std::env::var("MONITORING_WINDOW_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            monitoring_threshold: std::env::var("MONITORING_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}

impl Settings {
    /// Resolve the classification for a submission whose request body left
    /// it unset (spec.md §4.2 step 1).
    pub fn resolve_default_classification(&self) -> Result<Classification, AppError> {
        match &self.default_classification {
            None => Err(AppError::Validation {
                message: "classification is required and no default is configured".into(),
                reason_category: "classification_required".into(),
                loc: vec!["body".into(), "classification".into()],
            }),
            Some(raw) => Classification::from_str(raw).map_err(|_| AppError::Validation {
                message: format!("configured default_classification '{raw}' is invalid"),
                reason_category: "invalid_default_classification".into(),
                loc: vec!["config".into(), "default_classification".into()],
            }),
        }
    }
}
