//! Request tracing
//!
//! Every request runs inside a span carrying its request id. The id comes
//! from an incoming `X-Request-ID` header or is generated, and is echoed on
//! the response.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::rate_limiter::extract_client_ip;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = extract_client_ip(request.headers());

    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let mut response = async move {
        tracing::debug!(client_ip = %client_ip, "Request started");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    span.in_scope(|| {
        let code = status.as_u16();
        if status.is_server_error() {
            tracing::error!(status = code, duration_ms, "Request completed with error");
        } else if status.is_client_error() {
            tracing::warn!(status = code, duration_ms, "Request completed with client error");
        } else {
            tracing::info!(status = code, duration_ms, "Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
