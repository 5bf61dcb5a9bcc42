//! Header extraction for the three cross-cutting headers of spec.md §6:
//! `X-API-Key`, `X-MFA-Token`, and `x-request-id`. Kept as thin
//! `FromRequestParts` impls so handlers declare them as ordinary
//! parameters rather than reaching into `HeaderMap` by hand.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::api::AppState;

fn header_str(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// The caller-supplied `x-request-id`, or a freshly minted uuid if absent
/// — this value is what every response envelope echoes back.
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, "x-request-id").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(RequestId(id))
    }
}

/// The raw `X-API-Key` header value, unresolved. Route handlers pass this
/// to `AuthService::resolve_principal` themselves so the 401/403 paths can
/// be audited and enveloped with the right request id.
pub struct ApiKeyHeader(pub Option<String>);

impl FromRequestParts<AppState> for ApiKeyHeader {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ApiKeyHeader(header_str(parts, "x-api-key")))
    }
}

/// The raw `X-MFA-Token` header value, unresolved.
pub struct MfaHeader(pub Option<String>);

impl FromRequestParts<AppState> for MfaHeader {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MfaHeader(header_str(parts, "x-mfa-token")))
    }
}

/// Best-effort client IP, read from the `x-forwarded-for` header (no
/// `ConnectInfo` layer is wired up — this core speaks plain HTTP behind a
/// proxy that is expected to set the header, per spec.md §4.7's allow-list
/// check).
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = header_str(parts, "x-forwarded-for").map(|v| v.split(',').next().unwrap_or("").trim().to_string());
        Ok(ClientIp(ip))
    }
}
