mod api;
mod audit;
mod clock;
mod config;
mod crypto;
mod domain;
mod error;
mod pipelines;
mod services;
mod stores;

use std::sync::Arc;

use axum::http::HeaderValue;
use rand::RngCore;
use sha2::{Digest, Sha512};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use api::AppState;
use audit::AuditChainEngine;
use clock::{Clock, SystemClock};
use config::Settings;
use domain::{ApiKey, KeyVersion, Role};
use pipelines::{BackupPipeline, RestorePipeline};
use services::{AuthService, IncidentService, KeyManagementService, MonitoringService, PolicyEngine, RestoreAccessTokenService};
use stores::{
    ApiKeysRepository, InMemoryAlertsRepository, InMemoryApiKeysRepository, InMemoryAuditRepository, InMemoryBackupsRepository,
    InMemoryBlobStore, InMemoryIncidentRepository, InMemoryKeyMaterialStore, InMemoryKeyVersionsRepository, InMemoryPoliciesRepository,
    KeyMaterialStore, KeyVersionsRepository,
};

const BOOTSTRAP_KEY_VERSION: &str = "v1";

fn build_cors(settings: &Settings) -> CorsLayer {
    if settings.cors_origins.trim() == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = settings
            .cors_origins
            .split(',')
            .filter_map(|o| o.trim().parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "vault_gateway=info,tower_http=info".into()),
        )
        .init();

    let settings = Arc::new(Settings::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let api_keys = Arc::new(InMemoryApiKeysRepository::new());
    let alerts = Arc::new(InMemoryAlertsRepository::new());
    let audit_repo = Arc::new(InMemoryAuditRepository::new());
    let backups = Arc::new(InMemoryBackupsRepository::new());
    let blob_store = Arc::new(InMemoryBlobStore::new());
    let incident_repo = Arc::new(InMemoryIncidentRepository::new());
    let key_material = Arc::new(InMemoryKeyMaterialStore::new());
    let key_versions = Arc::new(InMemoryKeyVersionsRepository::new());
    let policies = Arc::new(InMemoryPoliciesRepository::new());

    let audit = Arc::new(AuditChainEngine::new(audit_repo.clone(), clock.clone(), settings.audit_retry_limit));

    let auth = Arc::new(AuthService::new(api_keys.clone()));
    let policy = Arc::new(PolicyEngine::new(policies.clone()));
    let incident = Arc::new(IncidentService::new(incident_repo.clone(), clock.clone()));
    let key_management = Arc::new(KeyManagementService::new(
        key_versions.clone(),
        key_material.clone(),
        backups.clone(),
        incident.clone(),
        audit.clone(),
        clock.clone(),
    ));
    let monitoring = Arc::new(MonitoringService::new(alerts.clone(), audit.clone(), clock.clone()));
    let restore_tokens = Arc::new(RestoreAccessTokenService::new(clock.clone()));

    let backup_pipeline = Arc::new(BackupPipeline::new(
        settings.clone(),
        policy.clone(),
        backups.clone(),
        key_management.clone(),
        blob_store.clone(),
        audit.clone(),
        clock.clone(),
    ));
    let restore_pipeline = Arc::new(RestorePipeline::new(
        settings.clone(),
        auth.clone(),
        policy.clone(),
        backups.clone(),
        blob_store.clone(),
        key_management.clone(),
        incident.clone(),
        restore_tokens.clone(),
        monitoring.clone(),
        audit.clone(),
    ));

    let mut key_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    key_material.put(BOOTSTRAP_KEY_VERSION, key_bytes).await;
    key_material.set_active_version(BOOTSTRAP_KEY_VERSION).await;
    key_versions
        .upsert(KeyVersion {
            version_id: BOOTSTRAP_KEY_VERSION.to_string(),
            is_active: true,
            is_destroyed: false,
            rotated_from_version: None,
            created_by_key_id: None,
            rotation_reason: Some("initial bootstrap".into()),
            created_at: clock.now(),
            activated_at: Some(clock.now()),
            destroyed_at: None,
        })
        .await
        .expect("seed key version");

    let mut raw_key_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw_key_bytes);
    let raw_key = hex::encode(raw_key_bytes);
    let key_hash = hex::encode(Sha512::digest(raw_key.as_bytes()));
    api_keys
        .insert(ApiKey {
            key_id: clock.new_id(),
            key_hash,
            key_prefix: raw_key[..8].to_string(),
            role: Role::SuperAdmin,
            department: Some("platform".into()),
            created_at: clock.now(),
            revoked_at: None,
            allowed_ips: None,
        })
        .await
        .expect("seed bootstrap api key");

    info!(bootstrap_api_key = %raw_key, "seeded bootstrap super-admin key (store it now, it is never shown again)");

    let state = AppState {
        settings: settings.clone(),
        clock: clock.clone(),
        auth,
        policy,
        incident,
        key_management,
        monitoring,
        restore_tokens,
        audit,
        backup_pipeline,
        restore_pipeline,
        api_keys,
        alerts,
        key_versions,
        policies,
        backups,
        blob_store,
    };

    let cors = build_cors(&settings);

    let app = api::routes::router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await.expect("bind address");
    info!(addr = %settings.bind_addr, "vault-gateway listening");
    axum::serve(listener, app).await.expect("server error");
}
