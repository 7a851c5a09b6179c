//! Session extractors
//!
//! The session token travels in the session cookie or, for non-browser
//! clients, as a Bearer token.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::{AuthError, AuthService, SessionIdentity};
use crate::error::ApiError;

/// Raw session token from the request, if one was presented
#[derive(Debug, Clone, Default)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let cookie = jar
            .get(&auth_service.settings().cookie_name)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty());

        let token = match cookie {
            Some(token) => Some(token),
            None => TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .ok()
                .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string()),
        };

        Ok(SessionToken(token))
    }
}

/// Caller with a live session
///
/// ```rust,ignore
/// async fn me(SessionUser(session): SessionUser) -> impl IntoResponse {
///     session.address.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionUser(pub SessionIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SessionToken(token) = match SessionToken::from_request_parts(parts, state).await {
            Ok(token) => token,
            Err(never) => match never {},
        };

        let token = token.ok_or_else(|| ApiError::from(AuthError::SessionNotFound).into_response())?;

        let auth_service = Arc::<AuthService>::from_ref(state);
        let identity = auth_service
            .authenticate(&token)
            .await
            .map_err(|e| ApiError::from(e).into_response())?;

        Ok(SessionUser(identity))
    }
}
