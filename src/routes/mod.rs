//! Route definitions

mod action;
mod auth;
mod user;

pub use action::action_routes;
pub use auth::auth_routes;
pub use user::user_routes;
