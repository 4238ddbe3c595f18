//! Error types for the client-side auth engine.
//!
//! All operations in this crate surface errors through [`AuthError`]. Each
//! variant maps to one failure class of the setup pipeline so the CLI can
//! tell the user *which* stage failed without parsing a backtrace.

/// Unified error type for the Roost client auth engine.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The authorization server redirected back with an `error` parameter
    /// (user denied consent, misconfigured redirect URI, ...). The reason is
    /// the provider's error code plus its description when one was sent.
    #[error("authorization server returned error: {reason}")]
    Provider {
        /// The provider's `error` code, with `error_description` appended.
        reason: String,
    },

    /// The callback's `state` did not match the value we sent. Treated as a
    /// security event: the setup attempt is aborted, never retried with the
    /// same PKCE pair.
    #[error("callback state mismatch (possible CSRF), aborting setup")]
    StateMismatch,

    /// The callback request was missing required query parameters.
    #[error("invalid callback: {reason}")]
    InvalidCallback {
        /// What was wrong with the request.
        reason: String,
    },

    /// The local callback listener timed out waiting for the redirect.
    #[error("timed out after {timeout_secs} seconds waiting for the browser redirect")]
    CallbackTimeout {
        /// How many seconds we waited before giving up.
        timeout_secs: u64,
    },

    /// No port in the candidate range could be bound.
    #[error(
        "no free callback port in {start}-{end}; free a port in that range or retry later"
    )]
    PortsExhausted {
        /// First port probed.
        start: u16,
        /// Last port probed.
        end: u16,
    },

    /// A callback listener is already active in this process.
    #[error("a callback listener is already active; only one setup may run at a time")]
    ListenerBusy,

    /// The token endpoint rejected the authorization code. Terminal for the
    /// attempt — authorization codes are single-use.
    #[error("code exchange rejected: {reason}")]
    ExchangeFailed {
        /// Explanation from the authorization server.
        reason: String,
    },

    /// The system CSPRNG failed. Setup cannot proceed without entropy.
    #[error("secure random source unavailable")]
    RngUnavailable,

    /// An HTTP request to the authorization server failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error from the callback TCP listener.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
