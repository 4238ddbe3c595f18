//! The device's runtime session.
//!
//! [`DeviceSession`] is the explicit credential holder: constructed once at
//! process start from the credential file and handed to whatever component
//! needs backend access. Its one network operation is [`refresh`] — the
//! unauthenticated exchange of the stored auth code for a short-lived
//! session token, performed at every boot and whenever the current token
//! ages out.
//!
//! [`refresh`]: DeviceSession::refresh

use serde::{Deserialize, Serialize};

use crate::credential::{CredentialRecord, CredentialStore};
use crate::error::{DeviceError, Result};

/// Wire shape of the refresh request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    auth_code: &'a str,
    device_id: &'a str,
}

/// Wire shape of a successful refresh response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    custom_token: String,
}

/// Wire shape of an error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// A running device's hold on its identity.
pub struct DeviceSession {
    credential: CredentialRecord,
    backend_url: String,
    client: reqwest::Client,
}

impl DeviceSession {
    /// Build a session from an already-loaded credential.
    pub fn new(credential: CredentialRecord, backend_url: impl Into<String>) -> Self {
        Self {
            credential,
            backend_url: backend_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a session by reading the credential store once.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotProvisioned`] when no credential exists.
    pub fn from_store(
        store: &dyn CredentialStore,
        backend_url: impl Into<String>,
    ) -> Result<Self> {
        let credential = store.load()?.ok_or(DeviceError::NotProvisioned)?;
        Ok(Self::new(credential, backend_url))
    }

    /// The loaded credential record.
    pub fn credential(&self) -> &CredentialRecord {
        &self.credential
    }

    /// Exchange the stored auth code for a fresh session token.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::CredentialRejected`] on a 401 — the code was
    ///   revoked or expired, and the operator must re-run setup.
    /// - [`DeviceError::RefreshFailed`] on any other non-2xx response.
    /// - [`DeviceError::Network`] on transport failure.
    pub async fn refresh(&self) -> Result<String> {
        let url = format!("{}/v1/devices/token", self.backend_url);

        tracing::debug!(device_id = %self.credential.device_id, "refreshing session token");

        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                auth_code: &self.credential.auth_code,
                device_id: &self.credential.device_id,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: RefreshResponse = response.json().await?;
            tracing::info!(device_id = %self.credential.device_id, "session token refreshed");
            return Ok(body.custom_token);
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP {status}"));

        if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(DeviceError::CredentialRejected { message })
        } else {
            Err(DeviceError::RefreshFailed { reason: message })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
