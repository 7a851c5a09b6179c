//! Action endpoint route

use axum::{routing::post, Router};

use crate::handlers::action;
use crate::state::AppState;

pub fn action_routes() -> Router<AppState> {
    Router::new().route("/api", post(action::dispatch))
}
