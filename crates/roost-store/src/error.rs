//! Error types for the roost-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`]. The
//! three auth-code validation failures are **distinct** variants: the
//! refresh endpoint collapses them into one opaque 401 for unauthenticated
//! callers, but server logs and security monitoring must be able to tell
//! them apart.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No auth code exists for the presented value.
    #[error("invalid auth code")]
    CodeNotFound,

    /// The auth code exists but its expiry has passed.
    #[error("auth code expired")]
    CodeExpired,

    /// The auth code exists but belongs to a different device.
    #[error("device ID mismatch")]
    DeviceMismatch,

    /// The system CSPRNG failed; no credential can be minted.
    #[error("secure random source unavailable")]
    RngUnavailable,

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_have_distinct_messages() {
        assert_eq!(StoreError::CodeNotFound.to_string(), "invalid auth code");
        assert_eq!(StoreError::CodeExpired.to_string(), "auth code expired");
        assert_eq!(StoreError::DeviceMismatch.to_string(), "device ID mismatch");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
