//! Server configuration, loaded from the environment.
//!
//! Every knob has a `ROOST_`-prefixed variable and a development default.
//! The one security-sensitive value is the session-token signing secret:
//! when unset, a random secret is generated at boot and a warning logged —
//! sessions then die with the process, which is fine for development and
//! wrong for production.

use std::path::PathBuf;

use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;

/// Default auth-code lifetime in days.
const DEFAULT_TTL_DAYS: i64 = 365;

/// Runtime configuration for the backend.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: String,
    /// Port to listen on.
    pub port: u16,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// HMAC secret for session-token signing.
    pub token_secret: Vec<u8>,
    /// Lifetime of newly minted auth codes, in days.
    pub auth_code_ttl_days: i64,
    /// Origin allowed to call the refresh endpoint cross-origin. `None`
    /// means permissive.
    pub cors_origin: Option<String>,
    /// OAuth client id — the audience expected on incoming ID tokens.
    pub oauth_client_id: String,
    /// The provider's tokeninfo endpoint.
    pub tokeninfo_url: String,
}

impl ServerConfig {
    /// Load configuration from the environment, falling back to
    /// development defaults.
    pub fn from_env() -> Self {
        let token_secret = match std::env::var("ROOST_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!(
                    "ROOST_TOKEN_SECRET is not set; using a random secret — \
                     session tokens will not survive a restart"
                );
                random_secret()
            }
        };

        Self {
            bind_addr: env_or("ROOST_BIND_ADDR", "127.0.0.1"),
            port: env_parsed("ROOST_PORT", 7870),
            db_path: PathBuf::from(env_or("ROOST_DB_PATH", "data/roost.db")),
            token_secret,
            auth_code_ttl_days: env_parsed("ROOST_AUTH_CODE_TTL_DAYS", DEFAULT_TTL_DAYS),
            cors_origin: std::env::var("ROOST_CORS_ORIGIN").ok().filter(|s| !s.is_empty()),
            oauth_client_id: env_or("ROOST_OAUTH_CLIENT_ID", ""),
            tokeninfo_url: env_or(
                "ROOST_TOKENINFO_URL",
                "https://oauth2.googleapis.com/tokeninfo",
            ),
        }
    }

    /// The `host:port` string the server binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 32 random bytes for a boot-scoped signing secret.
fn random_secret() -> Vec<u8> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; 32];
    // A failing CSPRNG at boot leaves nothing sensible to do but panic.
    rng.fill(&mut bytes).expect("system CSPRNG unavailable");
    bytes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_joins_host_and_port() {
        let config = ServerConfig {
            bind_addr: "0.0.0.0".into(),
            port: 8443,
            db_path: "data/roost.db".into(),
            token_secret: b"secret".to_vec(),
            auth_code_ttl_days: 365,
            cors_origin: None,
            oauth_client_id: String::new(),
            tokeninfo_url: String::new(),
        };
        assert_eq!(config.addr(), "0.0.0.0:8443");
    }

    #[test]
    fn random_secret_has_entropy() {
        let a = random_secret();
        let b = random_secret();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
