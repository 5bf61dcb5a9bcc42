//! Composition root's product: every service, pipeline, and store trait
//! object an HTTP handler needs directly (as opposed to only through a
//! pipeline), cloned cheaply via `Arc` per request (spec.md §2, §9 "DI over
//! module-level globals").

use std::sync::Arc;

use crate::audit::AuditChainEngine;
use crate::clock::Clock;
use crate::config::Settings;
use crate::pipelines::{BackupPipeline, RestorePipeline};
use crate::services::{AuthService, IncidentService, KeyManagementService, MonitoringService, PolicyEngine, RestoreAccessTokenService};
use crate::stores::{AlertsRepository, ApiKeysRepository, BackupsRepository, BlobStore, KeyVersionsRepository, PoliciesRepository};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub clock: Arc<dyn Clock>,
    pub auth: Arc<AuthService>,
    pub policy: Arc<PolicyEngine>,
    pub incident: Arc<IncidentService>,
    pub key_management: Arc<KeyManagementService>,
    pub monitoring: Arc<MonitoringService>,
    pub restore_tokens: Arc<RestoreAccessTokenService>,
    pub audit: Arc<AuditChainEngine>,
    pub backup_pipeline: Arc<BackupPipeline>,
    pub restore_pipeline: Arc<RestorePipeline>,
    pub api_keys: Arc<dyn ApiKeysRepository>,
    pub alerts: Arc<dyn AlertsRepository>,
    pub key_versions: Arc<dyn KeyVersionsRepository>,
    pub policies: Arc<dyn PoliciesRepository>,
    pub backups: Arc<dyn BackupsRepository>,
    pub blob_store: Arc<dyn BlobStore>,
}
