//! The server half of the identity sign-in bridge.
//!
//! The backend does not parse identity tokens itself — it hands them to an
//! [`IdentityVerifier`], the seam behind which the identity provider's
//! trust machinery lives. Production uses [`TokeninfoVerifier`], which
//! asks the provider's tokeninfo endpoint to validate the assertion;
//! tests substitute their own implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// A verified interactive caller.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The provider's stable subject identifier.
    pub user_id: String,
    /// The account email, when the provider shares it.
    pub email: Option<String>,
}

/// Verifies provider ID tokens into backend identities.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify an ID token.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthenticated`] if the token is malformed, expired,
    /// not trusted, or issued to a different client.
    async fn verify(&self, id_token: &str) -> ApiResult<Identity>;
}

// ---------------------------------------------------------------------------
// Tokeninfo-backed implementation
// ---------------------------------------------------------------------------

/// Validates ID tokens against the provider's tokeninfo endpoint.
pub struct TokeninfoVerifier {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

/// The subset of the tokeninfo response the backend cares about.
#[derive(Debug, Deserialize)]
struct TokeninfoResponse {
    sub: String,
    aud: String,
    email: Option<String>,
}

impl TokeninfoVerifier {
    /// Create a verifier for `endpoint`, accepting only tokens issued to
    /// `client_id`.
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for TokeninfoVerifier {
    async fn verify(&self, id_token: &str) -> ApiResult<Identity> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("tokeninfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthenticated(
                "identity token rejected by provider".into(),
            ));
        }

        let info: TokeninfoResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("tokeninfo response unreadable: {e}")))?;

        // A token issued to some other client must not open a session here.
        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "identity token issued to a different client");
            return Err(ApiError::Unauthenticated(
                "identity token audience mismatch".into(),
            ));
        }

        Ok(Identity {
            user_id: info.sub,
            email: info.email,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
