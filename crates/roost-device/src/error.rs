//! Error types for the device runtime crate.

/// Unified error type for device-side operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// No credential file exists — the device has not been set up.
    #[error("device is not provisioned; run `roost setup` first")]
    NotProvisioned,

    /// The home directory could not be determined for the default
    /// credential path.
    #[error("cannot locate home directory for the credential file")]
    NoHomeDir,

    /// The backend rejected the stored credential (revoked, expired, or
    /// replayed). Recovering requires re-running setup.
    #[error("credential rejected by backend: {message}")]
    CredentialRejected {
        /// The backend's terse error message.
        message: String,
    },

    /// The refresh call failed for a non-credential reason.
    #[error("token refresh failed: {reason}")]
    RefreshFailed {
        /// What went wrong.
        reason: String,
    },

    /// An HTTP request to the backend failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error reading or writing the credential file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, DeviceError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
