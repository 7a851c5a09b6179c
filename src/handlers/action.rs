//! Action endpoint
//!
//! `POST /api` carries `{"Action", "RequestUUID", ...params}`. The action
//! name selects a closed [`Action`], the authorization gate applies its
//! class, and the remaining parameters decode into the action's typed
//! request. Every outcome, including failures, is an [`ActionResponse`]
//! envelope.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::{Action, Grant, WalletAddress};
use crate::error::ApiError;
use crate::middleware::SessionToken;
use crate::models::{
    ActionRequest, ActionResponse, ChallengeRequest, NonceResponse, ProfileResponse,
    SessionRequest, TokenResponse, UpdateProfileResponse, RET_PARTIAL,
};
use crate::profile::ProfileChanges;
use crate::state::AppState;

use super::auth::{with_session_cookie, without_session_cookie};
use super::health::health_status;
use super::user::{apply_profile_changes, user_info};

/// Envelope name for requests whose action could not be read
const UNREADABLE_ACTION_RESPONSE: &str = "ErrorResponse";

/// POST /api
pub async fn dispatch(
    State(state): State<AppState>,
    token: SessionToken,
    jar: CookieJar,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Unreadable action request");
            return failure(
                UNREADABLE_ACTION_RESPONSE.to_string(),
                Uuid::new_v4().to_string(),
                rejection.into(),
            );
        }
    };

    let request_uuid = req
        .request_uuid
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if req.action.is_empty() {
        return failure(
            UNREADABLE_ACTION_RESPONSE.to_string(),
            request_uuid,
            ApiError::BadRequest("Action field is required".to_string()),
        );
    }

    let action = match req.action.parse::<Action>() {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(action = %req.action, "Unknown action");
            let name = format!("{}Response", req.action);
            return failure(name, request_uuid, ApiError::from(e));
        }
    };

    let outcome = run(&state, action, req.params, &token, jar).await;

    match outcome {
        Ok((jar, response)) => {
            let response = ActionResponse {
                request_uuid,
                ..response
            };
            (jar, Json(response)).into_response()
        }
        Err(e) => failure(action.response_name(), request_uuid, e),
    }
}

fn failure(action: String, request_uuid: String, error: ApiError) -> Response {
    let status = error.status_code();
    let code = error.error_code();

    if status.is_server_error() {
        tracing::error!(error = %error, code = %code, "Action failed");
    } else {
        tracing::debug!(error = %error, code = %code, "Action rejected");
    }

    let mut envelope = ActionResponse::new(action, request_uuid)
        .with_ret_code(status.as_u16())
        .with_message(error.public_message());
    envelope.data.insert("ErrorCode".to_string(), json!(code));

    (status, Json(envelope)).into_response()
}

fn decode<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, ApiError> {
    Ok(serde_json::from_value(Value::Object(params))?)
}

fn session_address(params: Map<String, Value>) -> Result<WalletAddress, ApiError> {
    let req: SessionRequest = decode(params)?;
    WalletAddress::parse(&req.address).map_err(|e| ApiError::Auth(e.into()))
}

async fn run(
    state: &AppState,
    action: Action,
    mut params: Map<String, Value>,
    token: &SessionToken,
    jar: CookieJar,
) -> Result<(CookieJar, ActionResponse), ApiError> {
    let grant = state
        .auth_service
        .authorize(action, token.as_deref(), &mut params)
        .await?;

    let response = ActionResponse::new(action.response_name(), String::new());
    let settings = state.auth_service.settings();

    match action {
        Action::ConnectWallet => {
            let req: ChallengeRequest = decode(params)?;
            let challenge = state.auth_service.issue_challenge(&req.address).await?;
            let response = response
                .with_message("Nonce issued")
                .with_data(&NonceResponse {
                    nonce: challenge.nonce,
                })?;
            Ok((jar, response))
        }
        Action::VerifySignature => {
            let Grant::Login(outcome) = grant else {
                return Err(ApiError::InternalError(
                    "signature action authorized without a login".to_string(),
                ));
            };
            let jar = with_session_cookie(jar, settings, &outcome);
            let response = response
                .with_message("Signature verified successfully")
                .with_data(&TokenResponse {
                    token: outcome.token,
                    profile_exists: outcome.profile_exists,
                })?;
            Ok((jar, response))
        }
        Action::Logout => {
            state.auth_service.logout(token.as_deref()).await?;
            let jar = without_session_cookie(jar, settings);
            Ok((jar, response.with_message("Logged out")))
        }
        Action::HealthCheck => {
            let (_, health) = health_status(state).await;
            let response = response.with_data(&health)?;
            Ok((jar, response))
        }
        Action::GetUserInfo => {
            let address = session_address(params)?;
            let info = user_info(state, &address).await?;
            Ok((jar, response.with_data(&info)?))
        }
        Action::GetUserProfile => {
            let address = session_address(params)?;
            let profile = state.profile_service.get(address.as_str()).await?;
            let response = response.with_data(&ProfileResponse::from(profile))?;
            Ok((jar, response))
        }
        Action::UpdateUserProfile => {
            let address = session_address(params.clone())?;
            let changes: ProfileChanges = decode(params)?;
            let update = apply_profile_changes(state, &address, changes).await?;

            let response = if update.username_deferred {
                response
                    .with_ret_code(RET_PARTIAL)
                    .with_message("Profile updated; username can only be changed once every 24 hours")
            } else {
                response.with_message("Profile updated")
            };

            let response = response.with_data(&UpdateProfileResponse {
                profile: update.profile.into(),
                username_updated: update.username_updated,
            })?;
            Ok((jar, response))
        }
    }
}
