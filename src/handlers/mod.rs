//! HTTP handlers

pub mod action;
pub mod auth;
pub mod health;
pub mod user;

pub use action::dispatch;
pub use auth::{get_current_user, logout, request_challenge, verify_signature};
pub use health::{health_check, root};
pub use user::{get_my_profile, update_my_profile};
