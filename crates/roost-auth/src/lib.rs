//! Client-side OAuth 2.0 + PKCE engine for Roost device setup.
//!
//! This crate implements the interactive half of device provisioning:
//!
//! - **PKCE challenge generation** (RFC 7636) with a CSRF `state` token
//! - **Authorization URL building** for the identity provider
//! - **Local callback listener** — a transient loopback HTTP server that
//!   waits for exactly one valid OAuth redirect
//! - **Authorization-code exchange** against the provider's token endpoint
//!
//! The pieces compose into a strictly sequential setup pipeline:
//!
//! ```text
//! PkceChallenge::generate()
//!     └─> OAuthFlow::authorization_url()   (user opens in browser)
//!     └─> CallbackListener::bind() .wait_for_callback()
//!     └─> OAuthFlow::exchange_code()
//! ```
//!
//! Everything here is ephemeral — nothing in this crate persists state.
//! The long-lived device credential is minted by the backend and stored by
//! `roost-device`.

pub mod callback;
pub mod error;
pub mod oauth;
pub mod pkce;

// Re-export key types at the crate root for convenience.
pub use callback::{CallbackListener, CallbackResult, DEFAULT_PORT_RANGE};
pub use error::{AuthError, Result};
pub use oauth::{ExchangedTokens, OAuthConfig, OAuthFlow};
pub use pkce::PkceChallenge;
