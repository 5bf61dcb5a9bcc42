//! HTTP surface: one module per route group under `routes/`, mirroring
//! spec.md §6's table exactly. `AppState` composes every service/pipeline;
//! `extractors.rs` resolves the principal and request id headers common to
//! almost every handler.

mod extractors;
mod state;

pub mod routes;

pub use extractors::{ApiKeyHeader, ClientIp, MfaHeader, RequestId};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;

/// Build the `{data, meta}` envelope of spec.md §6 for a successful
/// response, echoing the caller-supplied (or generated) request id.
fn success_envelope<T: Serialize>(request_id: &str, status: StatusCode, data: T) -> Response {
    let body = json!({
        "data": data,
        "meta": { "request_id": request_id },
    });
    (status, Json(body)).into_response()
}

/// Build the `{data: null, meta, error}` envelope for a failed response,
/// using `request_id` rather than the fresh id `AppError`'s own
/// `IntoResponse` impl would mint — that impl is kept as a fallback for
/// errors raised outside a route handler (e.g. extractor rejections).
fn error_envelope(request_id: &str, err: &AppError) -> Response {
    let status = err.status();
    let code = err.code();
    let message = err.message();
    tracing::warn!(code, %message, request_id, "request failed");
    let body = json!({
        "data": null,
        "meta": { "request_id": request_id },
        "error": { "code": code, "message": message },
    });
    (status, Json(body)).into_response()
}

/// Dispatch a handler's `Result` into the envelope shape, with `request_id`
/// threaded through either branch. This is the one place every route
/// handler funnels through, so the envelope format can't drift per-route.
pub fn respond<T: Serialize>(request_id: &str, status: StatusCode, result: Result<T, AppError>) -> Response {
    match result {
        Ok(data) => success_envelope(request_id, status, data),
        Err(err) => error_envelope(request_id, &err),
    }
}
