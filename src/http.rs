//! HTTP helpers: client address resolution, security headers, fallbacks.

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::{middleware, response::Response};
use std::net::IpAddr;

use crate::error::ApiError;

/// Client IP from `x-forwarded-for`, falling back to the peer address.
pub fn resolve_client_ip(headers: &HeaderMap, connect_ip: Option<IpAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<IpAddr>().ok())
        .or(connect_ip)
}

/// Adds `X-Frame-Options: DENY` and `X-Content-Type-Options: nosniff`.
pub async fn add_security_headers(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, StatusCode> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}

/// Method fallback for API routes: 405 with the JSON envelope.
pub async fn method_not_supported() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Router fallback for unknown paths: 404 with the JSON envelope.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("not found".into())
}
