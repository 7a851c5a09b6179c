//! Authentication service
//!
//! Challenge issuance, signature login, session lookup and the per-action
//! authorization gate.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::address::{AddressError, WalletAddress};
use super::crypto::{verify_personal_signature, RecoverableSignature, SignatureError};
use super::jwt::{generate_session_token, verify_session_token, JwtError};
use super::message::MessageTemplate;
use super::nonce::{NonceError, NonceManager};
use super::policy::{Action, AuthClass};
use crate::middleware::RateLimiter;
use crate::profile::ProfileRepository;
use crate::store::{SessionStore, StoreError};

/// Auth service errors. Each variant maps to one stable wire code.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Nonce not found or expired")]
    NonceNotFoundOrExpired,

    #[error("Invalid nonce")]
    InvalidNonce,

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Too many challenge requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidAddressFormat(_) => "INVALID_ADDRESS_FORMAT",
            AuthError::NonceNotFoundOrExpired => "NONCE_NOT_FOUND_OR_EXPIRED",
            AuthError::InvalidNonce => "INVALID_NONCE",
            AuthError::MalformedSignature(_) => "MALFORMED_SIGNATURE",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::TooManyRequests => "TOO_MANY_REQUESTS",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAddressFormat(_) | AuthError::MalformedSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::NonceNotFoundOrExpired
            | AuthError::InvalidNonce
            | AuthError::InvalidSignature
            | AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AddressError> for AuthError {
    fn from(e: AddressError) -> Self {
        AuthError::InvalidAddressFormat(e.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<NonceError> for AuthError {
    fn from(e: NonceError) -> Self {
        match e {
            NonceError::NotFound => AuthError::NonceNotFoundOrExpired,
            NonceError::Mismatch => AuthError::InvalidNonce,
            NonceError::Store(e) => e.into(),
        }
    }
}

impl From<SignatureError> for AuthError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::Malformed(_) | SignatureError::InvalidRecoveryId(_) => {
                AuthError::MalformedSignature(e.to_string())
            }
            SignatureError::RecoveryFailed(_) => AuthError::InvalidSignature,
        }
    }
}

/// Session and challenge timing
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub secret: String,
    pub session_ttl: Duration,
    pub nonce_ttl: Duration,
    pub cookie_name: String,
    pub secure_cookies: bool,
}

/// An issued challenge
#[derive(Debug, Clone)]
pub struct Challenge {
    pub address: WalletAddress,
    pub nonce: u32,
    /// The exact text the wallet must sign
    pub message: String,
}

/// Result of a successful signature login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub address: WalletAddress,
    pub session_id: String,
    pub token: String,
    pub profile_exists: bool,
}

/// A live session resolved from a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub address: WalletAddress,
    pub session_id: String,
}

/// What the authorization gate established for a request
#[derive(Debug, Clone)]
pub enum Grant {
    Anonymous,
    Session(SessionIdentity),
    Login(LoginOutcome),
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn SessionStore>,
    nonces: NonceManager,
    profiles: Arc<dyn ProfileRepository>,
    template: MessageTemplate,
    challenge_limiter: RateLimiter,
    settings: SessionSettings,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileRepository>,
        challenge_limiter: RateLimiter,
        settings: SessionSettings,
    ) -> Self {
        Self {
            nonces: NonceManager::new(store.clone(), settings.nonce_ttl),
            store,
            profiles,
            template: MessageTemplate::default(),
            challenge_limiter,
            settings,
        }
    }

    /// Replace the challenge text template.
    pub fn with_template(mut self, template: MessageTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn nonces(&self) -> &NonceManager {
        &self.nonces
    }

    fn session_key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }

    /// Return the outstanding challenge for `address`, issuing one if needed.
    pub async fn issue_challenge(&self, address: &str) -> Result<Challenge, AuthError> {
        let address = WalletAddress::parse(address)?;

        if !self.challenge_limiter.check(address.as_str()).await {
            tracing::warn!(address = %address, "Challenge rate limit exceeded");
            return Err(AuthError::TooManyRequests);
        }

        let nonce = self.nonces.issue_or_get(&address).await?;
        let message = self.template.render(&address, nonce);

        Ok(Challenge {
            address,
            nonce,
            message,
        })
    }

    /// Verify a signed challenge and open a session.
    ///
    /// Checks run cheapest first: address shape, signature shape, nonce
    /// lookup, key recovery. The nonce is consumed only after the signature
    /// verifies, so a bad signature leaves the challenge usable.
    pub async fn login(
        &self,
        address: &str,
        signature: &str,
        nonce: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let address = WalletAddress::parse(address)?;
        RecoverableSignature::from_hex(signature)?;

        let nonce: u32 = nonce.parse().map_err(|_| {
            tracing::warn!(address = %address, nonce = %nonce, "Nonce is not a number");
            AuthError::InvalidNonce
        })?;

        self.nonces.check(&address, nonce).await?;

        let message = self.template.render(&address, nonce);
        if !verify_personal_signature(&address, &message, signature)? {
            tracing::warn!(address = %address, "Signature does not match address");
            return Err(AuthError::InvalidSignature);
        }

        self.nonces.consume(&address, nonce).await?;

        let session_id = Uuid::new_v4().to_string();
        self.store
            .set(
                &Self::session_key(&session_id),
                address.as_str(),
                self.settings.session_ttl,
            )
            .await?;

        let token = generate_session_token(
            address.as_str(),
            &session_id,
            &self.settings.secret,
            self.settings.session_ttl.as_secs() as i64,
        )
        .map_err(|e| AuthError::Internal(e.to_string()))?;

        tracing::info!(address = %address, session_id = %session_id, "Session established");

        let profile_exists = match self.profiles.ensure_exists(address.as_str()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(address = %address, error = %e, "Failed to ensure profile exists");
                false
            }
        };

        Ok(LoginOutcome {
            address,
            session_id,
            token,
            profile_exists,
        })
    }

    /// Resolve a session token to its live session.
    pub async fn authenticate(&self, token: &str) -> Result<SessionIdentity, AuthError> {
        let claims = verify_session_token(token, &self.settings.secret).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AuthError::SessionNotFound
        })?;

        let bound = self
            .store
            .get(&Self::session_key(&claims.jti))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if bound != claims.sub {
            tracing::warn!(session_id = %claims.jti, "Session bound to a different address");
            return Err(AuthError::SessionNotFound);
        }

        let address = WalletAddress::parse(&bound).map_err(|_| AuthError::SessionNotFound)?;

        Ok(SessionIdentity {
            address,
            session_id: claims.jti,
        })
    }

    /// Apply `action`'s authorization class.
    ///
    /// Session actions get the session address written over any
    /// `Address` in `params`. Signature actions run the full login.
    pub async fn authorize(
        &self,
        action: Action,
        token: Option<&str>,
        params: &mut Map<String, Value>,
    ) -> Result<Grant, AuthError> {
        match action.auth_class() {
            AuthClass::NoAuth => Ok(Grant::Anonymous),
            AuthClass::SessionAuth => {
                let token = token.ok_or(AuthError::SessionNotFound)?;
                let identity = self.authenticate(token).await?;

                if let Some(claimed) = params.get("Address").and_then(Value::as_str) {
                    if !identity.address.matches(claimed) {
                        tracing::debug!(
                            action = %action,
                            claimed = %claimed,
                            session = %identity.address,
                            "Overriding client-supplied address"
                        );
                    }
                }
                params.insert(
                    "Address".to_string(),
                    Value::String(identity.address.as_str().to_string()),
                );

                Ok(Grant::Session(identity))
            }
            AuthClass::SignatureAuth => {
                let address = param_text(params, "Address");
                let signature = param_text(params, "Signature");
                let nonce = param_text(params, "Nonce");

                let outcome = self.login(&address, &signature, &nonce).await?;
                Ok(Grant::Login(outcome))
            }
        }
    }

    /// End the session named by `token`, if any.
    ///
    /// Absent, malformed and expired tokens have nothing to clear and succeed.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = token else {
            return Ok(());
        };

        let claims = match verify_session_token(token, &self.settings.secret) {
            Ok(claims) => claims,
            Err(JwtError::TokenExpired) => {
                tracing::debug!("Logout with expired token");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = %e, "Logout with unreadable token");
                return Ok(());
            }
        };

        if self.store.delete(&Self::session_key(&claims.jti)).await? {
            tracing::info!(address = %claims.sub, session_id = %claims.jti, "Session ended");
        }

        Ok(())
    }
}

/// String form of a request parameter. Numbers are accepted for fields that
/// wallets send either way, such as the nonce.
fn param_text(params: &Map<String, Value>, key: &str) -> String {
    match params.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
