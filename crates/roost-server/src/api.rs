//! HTTP route handlers.
//!
//! Every endpoint has an explicit request/response record, validated at
//! the boundary before anything downstream trusts it. Wire field names are
//! camelCase.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use roost_store::StoreError;
use roost_store::auth_codes::{code_prefix, is_valid_format};

use crate::error::{ApiError, ApiResult};
use crate::identity::Identity;
use crate::state::AppState;
use crate::token::{SessionClaims, TokenKind};

// ---------------------------------------------------------------------------
// POST /v1/identity/signin
// ---------------------------------------------------------------------------

/// Request body for the sign-in bridge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    /// The identity provider's ID token from the interactive OAuth flow.
    pub id_token: String,
}

/// Response body for the sign-in bridge.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    /// Short-lived user session token for the setup RPC.
    pub session_token: String,
}

/// Exchange a provider ID token for a backend session.
pub async fn signin(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> ApiResult<Json<SigninResponse>> {
    let Json(request) = payload.map_err(bad_body)?;

    let identity = state.identity.verify(&request.id_token).await?;
    let session_token = state.tokens.mint_user_token(&identity.user_id)?;

    info!(user_id = %identity.user_id, "interactive sign-in");

    Ok(Json(SigninResponse { session_token }))
}

// ---------------------------------------------------------------------------
// POST /v1/devices/setup
// ---------------------------------------------------------------------------

/// Request body for the device setup RPC.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDeviceRequest {
    /// Display name, 1–50 characters.
    pub device_name: String,
    /// Present only on re-authentication of an already-owned device.
    pub device_id: Option<String>,
}

/// Response body for the device setup RPC.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDeviceResponse {
    /// The device's UUID.
    pub device_id: String,
    /// The new long-lived credential — returned here and nowhere else.
    pub auth_code: String,
}

/// Mint or rotate a device credential for the authenticated caller.
pub async fn setup_device(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SetupDeviceRequest>, JsonRejection>,
) -> ApiResult<Json<SetupDeviceResponse>> {
    let claims = authenticate_user(&state, &headers)?;
    let Json(request) = payload.map_err(bad_body)?;

    let identity = Identity {
        user_id: claims.sub,
        email: None,
    };

    let provisioned = state
        .registrar
        .setup_device(&identity, &request.device_name, request.device_id.as_deref())
        .await?;

    Ok(Json(SetupDeviceResponse {
        device_id: provisioned.device_id,
        auth_code: provisioned.auth_code,
    }))
}

// ---------------------------------------------------------------------------
// POST /v1/devices/token
// ---------------------------------------------------------------------------

/// Request body for the unauthenticated refresh endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// The stored long-lived device credential (64 lowercase hex).
    pub auth_code: String,
    /// The device's UUID.
    pub device_id: String,
}

/// Response body for the refresh endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// A short-lived device session token.
    pub custom_token: String,
}

/// Exchange a device auth code for a short-lived session token.
///
/// The only unauthenticated route. The three internal validation failures
/// (unknown code, expired code, device mismatch) all collapse into one
/// opaque 401 so the endpoint is not an oracle for which codes exist; the
/// distinct reason goes to the info log.
pub async fn refresh_device_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<RefreshResponse>> {
    let Json(request) = payload.map_err(bad_body)?;

    if !is_valid_format(&request.auth_code) {
        return Err(ApiError::InvalidArgument(
            "authCode must be 64 lowercase hex characters".into(),
        ));
    }
    if Uuid::parse_str(&request.device_id).is_err() {
        return Err(ApiError::InvalidArgument(
            "deviceId must be a valid UUID".into(),
        ));
    }

    let prefix = code_prefix(&request.auth_code).to_string();

    let validated = match state
        .auth_codes
        .validate(&request.auth_code, &request.device_id)
        .await
    {
        Ok(validated) => validated,
        Err(
            reason @ (StoreError::CodeNotFound
            | StoreError::CodeExpired
            | StoreError::DeviceMismatch),
        ) => {
            // Expected and frequent (stale devices, clock drift) — info,
            // not warning. The distinct reason stays server-side.
            info!(
                device_id = %request.device_id,
                code_prefix = %prefix,
                reason = %reason,
                "device token refresh rejected"
            );
            return Err(ApiError::Unauthenticated("invalid device credentials".into()));
        }
        Err(other) => return Err(other.into()),
    };

    let custom_token = state.tokens.mint_device_token(
        &request.device_id,
        &validated.user_id,
        &validated.device_name,
        &prefix,
    )?;

    // Advisory usage stamp, off the response path. A lost update under a
    // race costs nothing.
    let codes = state.auth_codes.clone();
    let code = request.auth_code.clone();
    tokio::spawn(async move {
        if let Err(err) = codes.mark_used(&code).await {
            tracing::debug!(%err, "failed to stamp last_used");
        }
    });

    info!(
        device_id = %request.device_id,
        code_prefix = %prefix,
        "device session refreshed"
    );

    Ok(Json(RefreshResponse { custom_token }))
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

/// Response payload for the status endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Basic liveness probe.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Require a valid user session token in the Authorization header.
fn authenticate_user(state: &AppState, headers: &HeaderMap) -> ApiResult<SessionClaims> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthenticated("expected a Bearer token".into()))?;

    let claims = state.tokens.verify(token)?;

    if claims.kind != TokenKind::User {
        return Err(ApiError::Unauthenticated(
            "a user session is required for this call".into(),
        ));
    }

    Ok(claims)
}

/// Map any body-extraction rejection to a 400.
fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::InvalidArgument(format!("malformed request body: {rejection}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
