//! Client configuration, loaded from the environment.
//!
//! `.env` files are honored via `dotenvy` (loaded once in `main`). The
//! OAuth client id has no sensible default and is required for `setup`;
//! everything else falls back to development defaults. The Google
//! endpoints are defaults, not assumptions — any standard OAuth 2.0
//! provider slots in.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Everything the CLI needs to know about the outside world.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The OAuth client id registered with the identity provider.
    pub client_id: String,
    /// The OAuth client secret, for registrations that require one.
    pub client_secret: Option<String>,
    /// The provider's authorization endpoint.
    pub auth_url: String,
    /// The provider's token endpoint.
    pub token_url: String,
    /// Base URL of the Roost backend.
    pub backend_url: String,
    /// Override for the credential file location.
    pub credential_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let client_id = var("ROOST_CLIENT_ID")
            .filter(|v| !v.is_empty())
            .context("ROOST_CLIENT_ID is not set; register an OAuth client and export it")?;

        Ok(Self {
            client_id,
            client_secret: var("ROOST_CLIENT_SECRET").filter(|v| !v.is_empty()),
            auth_url: var("ROOST_AUTH_URL")
                .unwrap_or_else(|| "https://accounts.google.com/o/oauth2/v2/auth".to_string()),
            token_url: var("ROOST_TOKEN_URL")
                .unwrap_or_else(|| "https://oauth2.googleapis.com/token".to_string()),
            backend_url: var("ROOST_BACKEND_URL")
                .unwrap_or_else(|| "http://localhost:7870".to_string()),
            credential_path: var("ROOST_CREDENTIAL_PATH").map(PathBuf::from),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
