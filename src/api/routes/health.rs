//! Liveness/readiness probes (spec.md §6, SPEC_FULL.md §6 "three
//! always-available in-process dependency checks").

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;
use tokio::time::timeout;

use crate::api::{respond, AppState, RequestId};
use crate::error::AppError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn live(RequestId(request_id): RequestId) -> Response {
    respond(&request_id, StatusCode::OK, Ok::<_, AppError>(json!({ "status": "ok" })))
}

async fn probe<T, F>(fut: F) -> &'static str
where
    F: std::future::Future<Output = Result<T, AppError>>,
{
    match timeout(PROBE_TIMEOUT, fut).await {
        Ok(Ok(_)) => "ok",
        Ok(Err(_)) => "error",
        Err(_) => "timeout",
    }
}

pub async fn ready(State(state): State<AppState>, RequestId(request_id): RequestId) -> Response {
    let audit_chain = probe(state.audit.total_count()).await;
    let key_store = probe(state.key_versions.active()).await;
    let blob_store = probe(async {
        state.blob_store.put("__healthcheck__", "probe", vec![1]).await?;
        state.blob_store.get("__healthcheck__", "probe").await?;
        Ok::<_, AppError>(())
    })
    .await;

    let all_ok = [audit_chain, key_store, blob_store].iter().all(|s| *s == "ok");
    let body = json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "checks": {
            "audit_chain": audit_chain,
            "key_store": key_store,
            "blob_store": blob_store,
        },
    });
    respond(&request_id, StatusCode::OK, Ok::<_, AppError>(body))
}
