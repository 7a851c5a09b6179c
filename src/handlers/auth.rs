//! Authentication HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::{LoginOutcome, SessionSettings};
use crate::error::ApiError;
use crate::middleware::{SessionToken, SessionUser};
use crate::models::{
    ChallengeRequest, ChallengeResponse, UserInfoResponse, VerifyRequest, VerifyResponse,
};
use crate::state::AppState;

use super::user::user_info;

/// Session cookie carrying `token`
pub fn session_cookie(settings: &SessionSettings, token: &str) -> Cookie<'static> {
    Cookie::build((settings.cookie_name.clone(), token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure_cookies)
        .build()
}

/// Add the session cookie for a fresh login.
pub fn with_session_cookie(
    jar: CookieJar,
    settings: &SessionSettings,
    outcome: &LoginOutcome,
) -> CookieJar {
    jar.add(session_cookie(settings, &outcome.token))
}

/// Expire the session cookie.
pub fn without_session_cookie(jar: CookieJar, settings: &SessionSettings) -> CookieJar {
    jar.remove(Cookie::build((settings.cookie_name.clone(), "")).path("/"))
}

/// POST /auth/challenge
pub async fn request_challenge(
    State(state): State<AppState>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let Json(req) = payload?;
    let challenge = state.auth_service.issue_challenge(&req.address).await?;

    Ok(Json(ChallengeResponse {
        address: challenge.address.to_checksum(),
        nonce: challenge.nonce,
        message: challenge.message,
    }))
}

/// POST /auth/verify
pub async fn verify_signature(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<VerifyResponse>), ApiError> {
    let Json(req) = payload?;
    let outcome = state
        .auth_service
        .login(&req.address, &req.signature, &req.nonce.as_text())
        .await?;

    let jar = with_session_cookie(jar, state.auth_service.settings(), &outcome);

    Ok((
        jar,
        Json(VerifyResponse {
            address: outcome.address.to_checksum(),
            token: outcome.token,
            profile_exists: outcome.profile_exists,
        }),
    ))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    token: SessionToken,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    state.auth_service.logout(token.as_deref()).await?;

    let jar = without_session_cookie(jar, state.auth_service.settings());
    Ok((jar, StatusCode::NO_CONTENT))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
) -> Result<Json<UserInfoResponse>, ApiError> {
    let info = user_info(&state, &session.address).await?;
    Ok(Json(info))
}
