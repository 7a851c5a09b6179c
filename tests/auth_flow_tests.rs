//! End-to-end tests for the login flow and the session-gated actions,
//! driven through the full router against the in-memory backends.

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use tower::ServiceExt;

use wallet_auth_server::app::build_app;
use wallet_auth_server::auth::{
    address_from_key, personal_message_digest, MessageTemplate, WalletAddress,
};
use wallet_auth_server::config::{Config, Environment, LogFormat};
use wallet_auth_server::db::Backends;

const COOKIE_NAME: &str = "login_session";

fn test_config() -> Config {
    Config {
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        db_max_connections: 1,
        rate_limit_rps: 1000,
        challenge_rate_limit_per_minute: 100,
        cors_allowed_origins: None,
        log_level: "debug".to_string(),
        log_format: LogFormat::Pretty,
        session_secret: "integration-test-secret".to_string(),
        session_ttl_seconds: 3600,
        nonce_ttl_seconds: 300,
        cookie_name: COOKIE_NAME.to_string(),
        store_sweep_interval_seconds: 60,
    }
}

fn test_app() -> Router {
    build_app(&test_config(), Backends::in_memory()).router
}

fn wallet(seed: u8) -> (SigningKey, WalletAddress) {
    let key = SigningKey::from_slice(&[seed; 32]).unwrap();
    let address = address_from_key(key.verifying_key());
    (key, address)
}

/// Sign the login challenge the way a wallet's `personal_sign` does.
fn sign_challenge(key: &SigningKey, address: &WalletAddress, nonce: u64) -> String {
    let message = MessageTemplate::default().render(address, nonce as u32);
    let digest = personal_message_digest(message.as_bytes());
    let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    format!("0x{}", hex::encode(bytes))
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestResponse {
    fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
    }
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

async fn action(app: &Router, body: Value, cookie: Option<&str>) -> TestResponse {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

async fn connect(app: &Router, address: &str) -> u64 {
    let res = action(app, json!({ "Action": "ConnectWallet", "Address": address }), None).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    res.body["nonce"].as_u64().unwrap()
}

/// Full login through the action endpoint. Returns the session cookie pair.
async fn login(app: &Router, seed: u8) -> (WalletAddress, String) {
    let (key, address) = wallet(seed);
    let nonce = connect(app, &address.to_checksum()).await;
    let signature = sign_challenge(&key, &address, nonce);

    let res = action(
        app,
        json!({
            "Action": "VerifySignature",
            "Address": address.to_checksum(),
            "Signature": signature,
            "Nonce": nonce,
        }),
        None,
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let cookie = res.session_cookie().expect("session cookie");
    (address, cookie)
}

#[tokio::test]
async fn test_connect_wallet_is_idempotent() {
    let app = test_app();
    let (_, address) = wallet(1);

    let first = connect(&app, address.as_str()).await;
    let second = connect(&app, &address.to_checksum()).await;

    assert_eq!(first, second);
    assert!((100_000..=999_999).contains(&first));
}

#[tokio::test]
async fn test_login_then_replay_fails() {
    let app = test_app();
    let (key, address) = wallet(2);
    let nonce = connect(&app, address.as_str()).await;
    let signature = sign_challenge(&key, &address, nonce);

    let request = json!({
        "Action": "VerifySignature",
        "RequestUUID": "req-1",
        "Address": address.as_str(),
        "Signature": signature,
        "Nonce": nonce.to_string(),
    });

    let res = action(&app, request.clone(), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["Action"], "VerifySignatureResponse");
    assert_eq!(res.body["RequestUUID"], "req-1");
    assert_eq!(res.body["RetCode"], 0);
    assert_eq!(res.body["profile_exists"], true);
    assert!(res.body["token"].as_str().is_some_and(|t| !t.is_empty()));

    let set_cookie = res
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let replay = action(&app, request, None).await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["RetCode"], 401);
    assert_eq!(replay.body["ErrorCode"], "NONCE_NOT_FOUND_OR_EXPIRED");
    assert!(replay.session_cookie().is_none());
}

#[tokio::test]
async fn test_signature_from_other_key_is_rejected() {
    let app = test_app();
    let (_, victim) = wallet(3);
    let (attacker_key, _) = wallet(4);

    let nonce = connect(&app, victim.as_str()).await;
    let forged = sign_challenge(&attacker_key, &victim, nonce);

    let res = action(
        &app,
        json!({
            "Action": "VerifySignature",
            "Address": victim.as_str(),
            "Signature": forged,
            "Nonce": nonce,
        }),
        None,
    )
    .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["ErrorCode"], "INVALID_SIGNATURE");
    assert!(res.session_cookie().is_none());

    // The challenge survives a failed attempt
    assert_eq!(connect(&app, victim.as_str()).await, nonce);
}

#[tokio::test]
async fn test_malformed_inputs() {
    let app = test_app();
    let (key, address) = wallet(5);

    let res = action(&app, json!({ "Action": "ConnectWallet", "Address": "0x1234" }), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["ErrorCode"], "INVALID_ADDRESS_FORMAT");

    let nonce = connect(&app, address.as_str()).await;
    let signature = sign_challenge(&key, &address, nonce);
    let bad_v = format!("{}1f", &signature[..signature.len() - 2]);

    let res = action(
        &app,
        json!({
            "Action": "VerifySignature",
            "Address": address.as_str(),
            "Signature": bad_v,
            "Nonce": nonce,
        }),
        None,
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["ErrorCode"], "MALFORMED_SIGNATURE");

    let wrong_nonce = if nonce == 100_000 { 100_001 } else { 100_000 };
    let res = action(
        &app,
        json!({
            "Action": "VerifySignature",
            "Address": address.as_str(),
            "Signature": signature,
            "Nonce": wrong_nonce,
        }),
        None,
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["ErrorCode"], "INVALID_NONCE");
}

#[tokio::test]
async fn test_unknown_action() {
    let app = test_app();
    let res = action(&app, json!({ "Action": "DropTables", "RequestUUID": "x" }), None).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["Action"], "DropTablesResponse");
    assert_eq!(res.body["RequestUUID"], "x");
    assert_eq!(res.body["ErrorCode"], "UNKNOWN_ACTION");
}

async fn post_raw(app: &Router, uri: &str, body: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_unreadable_action_bodies_are_enveloped() {
    let app = test_app();

    let res = post_raw(&app, "/api", "{not json").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["Action"], "ErrorResponse");
    assert_eq!(res.body["RetCode"], 400);
    assert_eq!(res.body["ErrorCode"], "BAD_REQUEST");
    assert!(res.body["RequestUUID"].as_str().is_some_and(|id| !id.is_empty()));

    let res = action(&app, json!({ "RequestUUID": "no-action", "Address": "0x00" }), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["RequestUUID"], "no-action");
    assert_eq!(res.body["ErrorCode"], "BAD_REQUEST");
    assert_eq!(res.body["Message"], "Bad request: Action field is required");

    let res = action(&app, json!({ "Action": 7 }), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["ErrorCode"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_out_of_range_nonce_values_are_invalid_nonce() {
    let app = test_app();
    let (key, address) = wallet(13);
    let nonce = connect(&app, address.as_str()).await;
    let signature = sign_challenge(&key, &address, nonce);

    for bad in [json!(-5), json!(1.5)] {
        let res = action(
            &app,
            json!({
                "Action": "VerifySignature",
                "Address": address.as_str(),
                "Signature": signature,
                "Nonce": bad,
            }),
            None,
        )
        .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", res.body);
        assert_eq!(res.body["ErrorCode"], "INVALID_NONCE");

        let res = post_raw(
            &app,
            "/auth/verify",
            &json!({ "address": address.as_str(), "signature": signature, "nonce": bad })
                .to_string(),
        )
        .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", res.body);
        assert_eq!(res.body["error"]["code"], "INVALID_NONCE");
    }
}

#[tokio::test]
async fn test_unreadable_rest_bodies_use_error_shape() {
    let app = test_app();

    for (uri, body) in [
        ("/auth/challenge", "{}"),
        ("/auth/challenge", "{not json"),
        ("/auth/verify", r#"{"address":"0x00"}"#),
    ] {
        let res = post_raw(&app, uri, body).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{} {}", uri, body);
        assert_eq!(res.body["error"]["code"], "BAD_REQUEST");
        assert!(res.body["error"]["message"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_session_address_overrides_client_address() {
    let app = test_app();
    let (address, cookie) = login(&app, 6).await;
    let (_, other) = wallet(7);

    let res = action(
        &app,
        json!({ "Action": "GetUserInfo", "Address": other.as_str() }),
        Some(&cookie),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["address"], address.to_checksum());
    assert_eq!(res.body["username"], address.as_str());
    assert_eq!(res.body["nonce"], "No active nonce");
    assert!(res.body["RequestUUID"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_session_actions_require_session() {
    let app = test_app();

    let res = action(&app, json!({ "Action": "GetUserProfile" }), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["ErrorCode"], "SESSION_NOT_FOUND");

    let res = action(
        &app,
        json!({ "Action": "GetUserProfile" }),
        Some("login_session=forged.token.value"),
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_is_idempotent_and_kills_session() {
    let app = test_app();
    let (_, cookie) = login(&app, 8).await;

    let res = action(&app, json!({ "Action": "Logout" }), Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["RetCode"], 0);

    let res = action(&app, json!({ "Action": "GetUserInfo" }), Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = action(&app, json!({ "Action": "Logout" }), Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = action(&app, json!({ "Action": "Logout" }), None).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_profile_action_username_cooldown() {
    let app = test_app();
    let (_, cookie) = login(&app, 9).await;

    let res = action(
        &app,
        json!({ "Action": "UpdateUserProfile", "Username": "player_one", "Bio": "gm" }),
        Some(&cookie),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["RetCode"], 0);
    assert_eq!(res.body["username"], "player_one");
    assert_eq!(res.body["bio"], "gm");
    assert_eq!(res.body["username_updated"], true);

    let res = action(
        &app,
        json!({ "Action": "UpdateUserProfile", "Username": "player_two", "XUsername": "p2" }),
        Some(&cookie),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["RetCode"], 206);
    assert_eq!(res.body["username"], "player_one");
    assert_eq!(res.body["x_username"], "p2");
    assert_eq!(res.body["username_updated"], false);
}

#[tokio::test]
async fn test_update_profile_validation_and_uniqueness() {
    let app = test_app();
    let (_, alice) = login(&app, 10).await;
    let (_, bob) = login(&app, 11).await;

    let res = action(
        &app,
        json!({ "Action": "UpdateUserProfile", "Username": "ab" }),
        Some(&alice),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["ErrorCode"], "VALIDATION_ERROR");

    let res = action(
        &app,
        json!({ "Action": "UpdateUserProfile", "Username": "alice" }),
        Some(&alice),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = action(
        &app,
        json!({ "Action": "UpdateUserProfile", "Username": "alice" }),
        Some(&bob),
    )
    .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["ErrorCode"], "USERNAME_TAKEN");
}

#[tokio::test]
async fn test_health_check_action_and_route() {
    let app = test_app();

    let res = action(&app, json!({ "Action": "HealthCheck" }), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["version"], env!("CARGO_PKG_VERSION"));

    let res = send(
        &app,
        Request::builder()
            .uri("/health")
            .header("x-request-id", "trace-me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["store"], "connected");
    assert_eq!(res.headers["x-request-id"], "trace-me");
    assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_rest_login_flow_with_bearer_token() {
    let app = test_app();
    let (key, address) = wallet(12);

    let res = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/challenge")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "address": address.as_str() }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let nonce = res.body["nonce"].as_u64().unwrap();
    let message = res.body["message"].as_str().unwrap();
    assert!(message.ends_with(&format!("Nonce: {}", nonce)));

    let signature = sign_challenge(&key, &address, nonce);
    let res = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/verify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "address": address.as_str(),
                    "signature": signature,
                    "nonce": nonce,
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = send(
        &app,
        Request::builder()
            .uri("/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["address"], address.to_checksum());

    let res = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/api/users/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "username": "rest_user" }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["username"], "rest_user");

    let res = send(
        &app,
        Request::builder()
            .uri("/api/users/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["tokens"], 1000);
    assert_eq!(res.body["points"], 0);

    let res = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = send(
        &app,
        Request::builder()
            .uri("/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"]["code"], "SESSION_NOT_FOUND");
}
