//! Profile routes

use axum::{routing::get, Router};

use crate::handlers::user;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new().route(
        "/api/users/me",
        get(user::get_my_profile).put(user::update_my_profile),
    )
}
