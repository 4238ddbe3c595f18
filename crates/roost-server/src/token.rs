//! Short-lived session tokens.
//!
//! The platform's custom-session primitive, expressed as a self-contained
//! service: a compact HMAC-SHA256 signed token,
//! `base64url(claims_json) + "." + base64url(tag)`, minted and verified
//! only by the backend. Two kinds exist:
//!
//! - **user** tokens, minted by the sign-in bridge and accepted by the
//!   device registrar;
//! - **device** tokens, minted by the refresh endpoint and scoped to a
//!   `device_id` principal, carrying `{user_id, device_name,
//!   auth_code_prefix}` claims — the prefix gives audit correlation
//!   without ever embedding the bearer secret.
//!
//! Tokens are opaque to clients; nothing outside this module parses them.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Session token lifetime in seconds (1 hour).
const SESSION_TTL_SECS: i64 = 3_600;

/// What principal a session token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// An interactive operator, authenticated via the sign-in bridge.
    User,
    /// A running device, authenticated via its auth code.
    Device,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The principal id: a user id for user tokens, a device id for device
    /// tokens.
    pub sub: String,
    /// What kind of principal `sub` names.
    pub kind: TokenKind,
    /// Unix timestamp after which the token is rejected.
    pub exp: i64,
    /// The owning account, on device tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The device's display name, on device tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// First 8 hex characters of the auth code that produced this token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_code_prefix: Option<String>,
}

/// Mints and verifies session tokens with a single HMAC key.
pub struct SessionTokenService {
    key: hmac::Key,
}

impl SessionTokenService {
    /// Create a service from the configured signing secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Mint a user session token for the sign-in bridge.
    pub fn mint_user_token(&self, user_id: &str) -> ApiResult<String> {
        self.mint(SessionClaims {
            sub: user_id.to_string(),
            kind: TokenKind::User,
            exp: chrono::Utc::now().timestamp() + SESSION_TTL_SECS,
            user_id: None,
            device_name: None,
            auth_code_prefix: None,
        })
    }

    /// Mint a device session token, scoped to the device principal.
    pub fn mint_device_token(
        &self,
        device_id: &str,
        user_id: &str,
        device_name: &str,
        code_prefix: &str,
    ) -> ApiResult<String> {
        self.mint(SessionClaims {
            sub: device_id.to_string(),
            kind: TokenKind::Device,
            exp: chrono::Utc::now().timestamp() + SESSION_TTL_SECS,
            user_id: Some(user_id.to_string()),
            device_name: Some(device_name.to_string()),
            auth_code_prefix: Some(code_prefix.to_string()),
        })
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthenticated`] on any defect — malformed encoding,
    /// bad signature, or expired claims.
    pub fn verify(&self, token: &str) -> ApiResult<SessionClaims> {
        let (payload_b64, tag_b64) = token
            .split_once('.')
            .ok_or_else(|| ApiError::Unauthenticated("malformed session token".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ApiError::Unauthenticated("malformed session token".into()))?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| ApiError::Unauthenticated("malformed session token".into()))?;

        // ring's verify is constant-time over the tag.
        hmac::verify(&self.key, &payload, &tag)
            .map_err(|_| ApiError::Unauthenticated("session token signature invalid".into()))?;

        let claims: SessionClaims = serde_json::from_slice(&payload)
            .map_err(|_| ApiError::Unauthenticated("malformed session claims".into()))?;

        if claims.exp < chrono::Utc::now().timestamp() {
            return Err(ApiError::Unauthenticated("session token expired".into()));
        }

        Ok(claims)
    }

    fn mint(&self, claims: SessionClaims) -> ApiResult<String> {
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| ApiError::Internal(format!("claims serialization failed: {e}")))?;
        let tag = hmac::sign(&self.key, &payload);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(tag.as_ref()),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
