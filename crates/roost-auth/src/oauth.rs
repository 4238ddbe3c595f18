//! Authorization URL building and authorization-code exchange.
//!
//! The identity provider is a standard OAuth 2.0 server: a GET-able
//! authorization endpoint the user visits in a browser, and a token
//! endpoint this module POSTs to once the local callback delivers the
//! authorization code. PKCE (RFC 7636, S256) is mandatory; a client secret
//! is sent only when the OAuth client configuration requires one — some
//! desktop client registrations do, and PKCE alone is not universally
//! sufficient.

use serde::Deserialize;
use url::Url;

use crate::error::{AuthError, Result};
use crate::pkce::PkceChallenge;

/// The scopes requested during device setup. The `openid` + `email` +
/// `profile` set is what the backend needs to identify the operator.
const SCOPE: &str = "openid email profile";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the provider half of the setup flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// The OAuth client ID.
    pub client_id: String,

    /// The OAuth client secret, for client registrations that require one.
    pub client_secret: Option<String>,

    /// The authorization endpoint URL.
    pub auth_url: String,

    /// The token endpoint URL.
    pub token_url: String,

    /// The redirect URI — `http://localhost:{port}/callback`, fixed once
    /// the callback listener has claimed its port.
    pub redirect_uri: String,
}

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Tokens returned by the provider after a successful code exchange.
///
/// The `id_token` is the short-lived identity assertion handed to the
/// backend's sign-in bridge; the `access_token` is unused by Roost but
/// returned for completeness.
#[derive(Debug, Clone)]
pub struct ExchangedTokens {
    /// OpenID Connect identity token.
    pub id_token: String,
    /// Provider access token.
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,
    /// The scopes that were granted.
    pub scope: Option<String>,
}

/// Raw success response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    access_token: String,
    expires_in: Option<i64>,
    scope: Option<String>,
}

/// Raw error response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// OAuth flow
// ---------------------------------------------------------------------------

/// Stateless driver for the provider-facing half of setup.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthFlow {
    /// Create a new flow with the given configuration.
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the authorization URL the user should visit.
    ///
    /// Emits `client_id`, `redirect_uri`, `response_type=code`,
    /// `scope=openid email profile`, `state`, `code_challenge`, and
    /// `code_challenge_method=S256`. Every value is percent-encoded by the
    /// `url` crate's query serializer; no parameter is ever omitted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UrlParse`] if the configured `auth_url` is not
    /// a valid URL.
    pub fn authorization_url(&self, challenge: &PkceChallenge) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", &self.config.redirect_uri);
            params.append_pair("response_type", "code");
            params.append_pair("scope", SCOPE);
            params.append_pair("state", &challenge.state);
            params.append_pair("code_challenge", &challenge.code_challenge);
            params.append_pair("code_challenge_method", "S256");
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for provider tokens.
    ///
    /// Performs a single form-encoded POST. There is no retry: the
    /// authorization code is single-use, and replaying it after any failure
    /// is guaranteed to be rejected — the user restarts setup instead.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ExchangeFailed`] with the provider's error
    /// payload on a non-2xx response, or [`AuthError::Network`] on
    /// transport failure.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<ExchangedTokens> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];

        // Included only for confidential client registrations.
        if let Some(ref secret) = self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!(token_url = %self.config.token_url, "exchanging authorization code");

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let raw: TokenResponse = response.json().await?;
            let id_token = raw.id_token.ok_or_else(|| AuthError::ExchangeFailed {
                reason: "token response missing id_token".to_string(),
            })?;

            tracing::debug!("code exchange successful");

            Ok(ExchangedTokens {
                id_token,
                access_token: raw.access_token,
                expires_in: raw.expires_in,
                scope: raw.scope,
            })
        } else {
            let body = response.text().await.unwrap_or_default();

            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{} ({desc})", err.error),
                    None => err.error,
                },
                Err(_) => format!("HTTP {status}: {body}"),
            };

            Err(AuthError::ExchangeFailed { reason })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
