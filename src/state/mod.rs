//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthService;
use crate::profile::ProfileService;
use crate::store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub profile_service: Arc<ProfileService>,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        profile_service: Arc<ProfileService>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            auth_service,
            profile_service,
            store,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProfileService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.profile_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SessionStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}
