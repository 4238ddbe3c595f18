//! PKCE challenge and CSRF state generation (RFC 7636).
//!
//! One [`PkceChallenge`] is generated per setup attempt and lives only for
//! that attempt: the `state` binds the browser redirect to this process,
//! the `code_verifier` is sent in the token exchange, and the
//! `code_challenge` goes into the authorization URL. None of it is ever
//! persisted or logged.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{AuthError, Result};

/// Random bytes behind the code verifier. 96 bytes base64url-encode to the
/// RFC 7636 maximum verifier length of 128 characters.
const VERIFIER_BYTES: usize = 96;

/// Random bytes behind the CSRF state token (43 characters encoded).
const STATE_BYTES: usize = 32;

/// Ephemeral PKCE material for one setup attempt.
///
/// Consumed once by the callback validation and the token exchange, then
/// discarded.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// High-entropy verifier, base64url alphabet, 128 characters.
    pub code_verifier: String,
    /// `base64url(SHA-256(code_verifier))`, 43 characters.
    pub code_challenge: String,
    /// Independent random value binding the callback to this attempt.
    pub state: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier, its S256 challenge, and a state token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RngUnavailable`] if the system CSPRNG fails —
    /// setup cannot proceed without entropy.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();

        let mut verifier_bytes = [0u8; VERIFIER_BYTES];
        rng.fill(&mut verifier_bytes)
            .map_err(|_| AuthError::RngUnavailable)?;
        let code_verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; STATE_BYTES];
        rng.fill(&mut state_bytes)
            .map_err(|_| AuthError::RngUnavailable)?;
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Ok(Self {
            code_challenge: challenge_for(&code_verifier),
            code_verifier,
            state,
        })
    }
}

/// Derive the S256 code challenge for a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn challenge_for(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
