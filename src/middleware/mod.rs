//! HTTP middleware: request tracing, rate limiting, security headers and
//! session extraction.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::{SessionToken, SessionUser};
pub use rate_limiter::{extract_client_ip, rate_limit_layer, run_limiter_cleanup, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use tracing::{request_tracing, REQUEST_ID_HEADER};
