//! Service wiring and the HTTP router

use axum::http::{header, HeaderValue, Method};
use axum::{extract::Request, middleware::Next, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthService, SessionSettings};
use crate::config::Config;
use crate::db::Backends;
use crate::handlers;
use crate::middleware::{self, RateLimiter, REQUEST_ID_HEADER};
use crate::profile::ProfileService;
use crate::routes;
use crate::state::AppState;

/// A wired application
pub struct App {
    pub router: Router,
    pub state: AppState,
    /// Per-IP request limiter, for periodic cleanup
    pub request_limiter: RateLimiter,
    /// Per-address challenge limiter, for periodic cleanup
    pub challenge_limiter: RateLimiter,
}

/// Build services over `backends` and the full router.
pub fn build_app(config: &Config, backends: Backends) -> App {
    let challenge_limiter = RateLimiter::per_minute(config.challenge_rate_limit_per_minute);
    let request_limiter = RateLimiter::new(config.rate_limit_rps);

    let settings = SessionSettings {
        secret: config.session_secret.clone(),
        session_ttl: config.session_ttl(),
        nonce_ttl: config.nonce_ttl(),
        cookie_name: config.cookie_name.clone(),
        secure_cookies: config.secure_cookies(),
    };

    let auth_service = Arc::new(AuthService::new(
        backends.store.clone(),
        backends.profiles.clone(),
        challenge_limiter.clone(),
        settings,
    ));
    let profile_service = Arc::new(ProfileService::new(backends.profiles));

    let state = AppState::new(auth_service, profile_service, backends.store);

    let limiter = request_limiter.clone();
    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(routes::auth_routes())
        .merge(routes::user_routes())
        .merge(routes::action_routes())
        .with_state(state.clone())
        .layer(axum::middleware::from_fn(middleware::security_headers));

    if config.environment.is_production() {
        router = router.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let router = router.layer(
        ServiceBuilder::new()
            .layer(configure_cors(config.cors_allowed_origins.as_deref()))
            .layer(axum::middleware::from_fn(middleware::request_tracing))
            .layer(axum::middleware::from_fn(move |req: Request, next: Next| {
                let limiter = limiter.clone();
                middleware::rate_limit_layer(limiter)(req, next)
            })),
    );

    App {
        router,
        state,
        request_limiter,
        challenge_limiter,
    }
}

/// CORS from a comma-separated origin list. Explicit origins allow
/// credentials so the session cookie crosses origins; no list is permissive.
pub fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, REQUEST_ID_HEADER])
        .expose_headers([REQUEST_ID_HEADER])
        .allow_credentials(true)
}
