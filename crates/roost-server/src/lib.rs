//! # roost-server
//!
//! The Roost backend: everything a device or the setup CLI talks to after
//! the identity provider hands over an ID token.
//!
//! Three HTTP endpoints:
//!
//! - `POST /v1/identity/signin` — the sign-in bridge: exchanges a provider
//!   ID token for a short-lived user session token.
//! - `POST /v1/devices/setup` — the device registrar: authenticated by a
//!   user session token, mints (or rotates) a device's long-lived auth
//!   code.
//! - `POST /v1/devices/token` — the token refresh endpoint: the only
//!   unauthenticated route; exchanges a stored auth code for a short-lived
//!   device session token at every device boot.
//!
//! The long-lived auth code never appears anywhere else: not in session
//! claims (only its 8-character prefix), not in logs, not in any other
//! response shape.

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod registrar;
pub mod server;
pub mod state;
pub mod token;

// Re-export key types at the crate root for convenience.
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use identity::{Identity, IdentityVerifier, TokeninfoVerifier};
pub use registrar::{ProvisionedDevice, Registrar};
pub use server::Server;
pub use state::AppState;
pub use token::{SessionClaims, SessionTokenService, TokenKind};
