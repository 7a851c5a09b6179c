//! User profile handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use crate::auth::{AuthError, WalletAddress};
use crate::error::ApiError;
use crate::middleware::SessionUser;
use crate::models::{ProfileResponse, UpdateProfileResponse, UserInfoResponse};
use crate::profile::{ProfileChanges, ProfileUpdate};
use crate::state::AppState;

const NO_ACTIVE_NONCE: &str = "No active nonce";

/// Address, username and outstanding nonce, provisioning a missing profile.
pub async fn user_info(
    state: &AppState,
    address: &WalletAddress,
) -> Result<UserInfoResponse, ApiError> {
    let profile = state.profile_service.get_or_create(address.as_str()).await?;

    let nonce = state
        .auth_service
        .nonces()
        .peek(address)
        .await
        .map_err(AuthError::from)?
        .map(|n| n.to_string())
        .unwrap_or_else(|| NO_ACTIVE_NONCE.to_string());

    Ok(UserInfoResponse {
        address: address.to_checksum(),
        username: profile.username,
        nonce,
    })
}

/// Validate and apply profile changes for `address`.
pub async fn apply_profile_changes(
    state: &AppState,
    address: &WalletAddress,
    changes: ProfileChanges,
) -> Result<ProfileUpdate, ApiError> {
    changes.validate()?;
    let update = state.profile_service.update(address.as_str(), changes).await?;
    Ok(update)
}

/// GET /api/users/me
pub async fn get_my_profile(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.profile_service.get(session.address.as_str()).await?;
    Ok(Json(profile.into()))
}

/// PUT /api/users/me
pub async fn update_my_profile(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    payload: Result<Json<ProfileChanges>, JsonRejection>,
) -> Result<Json<UpdateProfileResponse>, ApiError> {
    let Json(changes) = payload?;
    let update = apply_profile_changes(&state, &session.address, changes).await?;

    Ok(Json(UpdateProfileResponse {
        profile: update.profile.into(),
        username_updated: update.username_updated,
    }))
}
