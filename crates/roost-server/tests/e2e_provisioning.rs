//! End-to-end tests for the provisioning and refresh HTTP API.
//!
//! These tests spin up the **real** Axum router on an OS-assigned
//! ephemeral port, make actual HTTP requests via `reqwest`, and verify the
//! full request/response cycle: sign-in bridge → device setup RPC → token
//! refresh endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use roost_server::{
    ApiError, ApiResult, AppState, Identity, IdentityVerifier, Server, ServerConfig,
};
use roost_store::{AuthCodeStore, Database, DeviceStore};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Accepts any token of the form `id-token-<name>` as the user `user-<name>`.
struct StaticVerifier;

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, id_token: &str) -> ApiResult<Identity> {
        match id_token.strip_prefix("id-token-") {
            Some(name) => Ok(Identity {
                user_id: format!("user-{name}"),
                email: None,
            }),
            None => Err(ApiError::Unauthenticated("unknown identity token".into())),
        }
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1".into(),
        port: 0,
        db_path: ":memory:".into(),
        token_secret: b"e2e-test-secret-e2e-test-secret!".to_vec(),
        auth_code_ttl_days: 365,
        cors_origin: None,
        oauth_client_id: "roost-e2e".into(),
        tokeninfo_url: String::new(),
    }
}

/// Start the real router on an ephemeral port. Returns the base URL plus
/// store handles over the same in-memory database for direct assertions.
async fn start_server() -> (String, AuthCodeStore, DeviceStore) {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();

    let state = Arc::new(AppState::new(
        &test_config(),
        db.clone(),
        Arc::new(StaticVerifier),
    ));
    let app = Server::router(state, None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    // Small yield so the listener is ready.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    (base, AuthCodeStore::new(db.clone()), DeviceStore::new(db))
}

async fn signin_as(client: &reqwest::Client, base: &str, name: &str) -> String {
    let resp = client
        .post(format!("{base}/v1/identity/signin"))
        .json(&json!({ "idToken": format!("id-token-{name}") }))
        .send()
        .await
        .expect("signin request failed");
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.expect("invalid signin JSON");
    body["sessionToken"]
        .as_str()
        .expect("sessionToken missing")
        .to_string()
}

async fn setup_device(
    client: &reqwest::Client,
    base: &str,
    session: &str,
    device_name: &str,
    device_id: Option<&str>,
) -> reqwest::Response {
    let mut body = json!({ "deviceName": device_name });
    if let Some(id) = device_id {
        body["deviceId"] = json!(id);
    }

    client
        .post(format!("{base}/v1/devices/setup"))
        .bearer_auth(session)
        .json(&body)
        .send()
        .await
        .expect("setup request failed")
}

async fn refresh(
    client: &reqwest::Client,
    base: &str,
    auth_code: &str,
    device_id: &str,
) -> reqwest::Response {
    client
        .post(format!("{base}/v1/devices/token"))
        .json(&json!({ "authCode": auth_code, "deviceId": device_id }))
        .send()
        .await
        .expect("refresh request failed")
}

// ── scenario A: new device ───────────────────────────────────────────────────

#[tokio::test]
async fn new_device_setup_yields_uuid_and_valid_code() {
    let (base, codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let session = signin_as(&client, &base, "alice").await;
    let resp = setup_device(&client, &base, &session, "Kitchen Pi", None).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let device_id = body["deviceId"].as_str().unwrap();
    let auth_code = body["authCode"].as_str().unwrap();

    // UUID v4 shape.
    let parsed = uuid::Uuid::parse_str(device_id).unwrap();
    assert_eq!(parsed.get_version_num(), 4);

    // 64 lowercase hex.
    assert_eq!(auth_code.len(), 64);
    assert!(auth_code.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));

    // The stored record resolves back to the same identity.
    let validated = codes.validate(auth_code, device_id).await.unwrap();
    assert_eq!(validated.user_id, "user-alice");
    assert_eq!(validated.device_name, "Kitchen Pi");
}

// ── scenario B: re-auth revokes the old code ─────────────────────────────────

#[tokio::test]
async fn reauth_rotates_and_revokes_the_prior_code() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let session = signin_as(&client, &base, "alice").await;

    let first: Value = setup_device(&client, &base, &session, "Kitchen Pi", None)
        .await
        .json()
        .await
        .unwrap();
    let device_id = first["deviceId"].as_str().unwrap().to_string();
    let code1 = first["authCode"].as_str().unwrap().to_string();

    let resp = setup_device(&client, &base, &session, "Kitchen Pi", Some(&device_id)).await;
    assert_eq!(resp.status(), 200);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["deviceId"].as_str().unwrap(), device_id);
    let code2 = second["authCode"].as_str().unwrap().to_string();

    assert_ne!(code1, code2);

    // The revoked code is rejected; the new one works.
    assert_eq!(refresh(&client, &base, &code1, &device_id).await.status(), 401);
    assert_eq!(refresh(&client, &base, &code2, &device_id).await.status(), 200);
}

// ── scenario C: device-id mismatch rejected ──────────────────────────────────

#[tokio::test]
async fn code_replayed_under_another_device_is_rejected() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let session = signin_as(&client, &base, "alice").await;
    let a: Value = setup_device(&client, &base, &session, "Device A", None)
        .await
        .json()
        .await
        .unwrap();
    let b: Value = setup_device(&client, &base, &session, "Device B", None)
        .await
        .json()
        .await
        .unwrap();

    let code_a = a["authCode"].as_str().unwrap();
    let device_b = b["deviceId"].as_str().unwrap();

    let resp = refresh(&client, &base, code_a, device_b).await;
    assert_eq!(resp.status(), 401);
}

// ── scenario D: expired code rejected ────────────────────────────────────────

#[tokio::test]
async fn expired_code_is_rejected_despite_correct_shape() {
    let (base, codes, devices) = start_server().await;
    let client = reqwest::Client::new();

    // Seed an already-expired code directly in the store.
    let device_id = uuid::Uuid::new_v4().to_string();
    let expired = codes
        .create("user-alice", &device_id, "Stale Pi", -1)
        .await
        .unwrap();
    devices
        .record_setup("user-alice", &device_id, "Stale Pi", &expired.code)
        .await
        .unwrap();

    let resp = refresh(&client, &base, &expired.code, &device_id).await;
    assert_eq!(resp.status(), 401);
}

// ── scenario F: refresh round trip ───────────────────────────────────────────

#[tokio::test]
async fn refresh_round_trip_mints_a_custom_token() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let session = signin_as(&client, &base, "alice").await;
    let provisioned: Value = setup_device(&client, &base, &session, "Kitchen Pi", None)
        .await
        .json()
        .await
        .unwrap();
    let device_id = provisioned["deviceId"].as_str().unwrap();
    let auth_code = provisioned["authCode"].as_str().unwrap();

    let resp = refresh(&client, &base, auth_code, device_id).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let token = body["customToken"].as_str().unwrap();
    assert!(!token.is_empty());

    // Same request against a different device id must fail.
    let other = uuid::Uuid::new_v4().to_string();
    let resp = refresh(&client, &base, auth_code, &other).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    // The opaque message must not leak which check failed.
    assert!(!body["error"].as_str().unwrap().contains("mismatch"));
}

// ── boundary behavior ────────────────────────────────────────────────────────

#[tokio::test]
async fn setup_without_session_is_unauthenticated() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/devices/setup"))
        .json(&json!({ "deviceName": "Kitchen Pi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // A device token is not a user session either: devices must never be
    // able to register other devices.
    let session = signin_as(&client, &base, "alice").await;
    let provisioned: Value = setup_device(&client, &base, &session, "Kitchen Pi", None)
        .await
        .json()
        .await
        .unwrap();
    let device_token_body: Value = refresh(
        &client,
        &base,
        provisioned["authCode"].as_str().unwrap(),
        provisioned["deviceId"].as_str().unwrap(),
    )
    .await
    .json()
    .await
    .unwrap();

    let resp = client
        .post(format!("{base}/v1/devices/setup"))
        .bearer_auth(device_token_body["customToken"].as_str().unwrap())
        .json(&json!({ "deviceName": "Sneaky Pi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn signin_with_unknown_token_is_unauthenticated() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/identity/signin"))
        .json(&json!({ "idToken": "garbage" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn setup_validates_name_and_device_id() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();
    let session = signin_as(&client, &base, "alice").await;

    let resp = setup_device(&client, &base, &session, "", None).await;
    assert_eq!(resp.status(), 400);

    let long = "x".repeat(51);
    let resp = setup_device(&client, &base, &session, &long, None).await;
    assert_eq!(resp.status(), 400);

    let resp = setup_device(&client, &base, &session, "Kitchen Pi", Some("not-a-uuid")).await;
    assert_eq!(resp.status(), 400);

    // A well-formed but unknown device id is not silently registered.
    let ghost = uuid::Uuid::new_v4().to_string();
    let resp = setup_device(&client, &base, &session, "Kitchen Pi", Some(&ghost)).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn refresh_rejects_malformed_bodies() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();
    let device_id = uuid::Uuid::new_v4().to_string();

    // Wrong length.
    let resp = refresh(&client, &base, &"a".repeat(63), &device_id).await;
    assert_eq!(resp.status(), 400);

    // Uppercase hex is invalid, not normalized.
    let resp = refresh(&client, &base, &"A".repeat(64), &device_id).await;
    assert_eq!(resp.status(), 400);

    // Bad device id.
    let resp = refresh(&client, &base, &"a".repeat(64), "not-a-uuid").await;
    assert_eq!(resp.status(), 400);

    // Missing fields entirely.
    let resp = client
        .post(format!("{base}/v1/devices/token"))
        .json(&json!({ "authCode": "a".repeat(64) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn refresh_rejects_non_post_methods() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/v1/devices/token"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
}

#[tokio::test]
async fn refresh_stamps_last_used() {
    let (base, codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let session = signin_as(&client, &base, "alice").await;
    let provisioned: Value = setup_device(&client, &base, &session, "Kitchen Pi", None)
        .await
        .json()
        .await
        .unwrap();
    let device_id = provisioned["deviceId"].as_str().unwrap();
    let auth_code = provisioned["authCode"].as_str().unwrap();

    assert_eq!(refresh(&client, &base, auth_code, device_id).await.status(), 200);

    // The stamp is asynchronous — give it a moment.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let record = codes.get(auth_code).await.unwrap().unwrap();
    assert!(record.last_used.is_some());
}

#[tokio::test]
async fn status_endpoint_reports_ok() {
    let (base, _codes, _devices) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/v1/status")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
