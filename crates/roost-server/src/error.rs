//! API error taxonomy and HTTP mapping.
//!
//! Four caller-visible classes, mirrored one-to-one onto status codes:
//! `unauthenticated` → 401, `invalid-argument` → 400, `not-found` → 404,
//! `internal` → 500. Only `internal` is opaque — its detail goes to the
//! server log, never to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use roost_store::StoreError;

/// Alias for `Result<T, ApiError>`.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller presented no identity, or one that failed verification.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The request shape was valid JSON but the contents were not.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced resource does not exist for this caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything unexpected. The detail is logged server-side; the caller
    /// sees only a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            StoreError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            // Code validation failures are handled explicitly at the refresh
            // boundary; reaching here means a handler forgot to, which is an
            // internal bug rather than a caller error.
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error serving request");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Unauthenticated("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::InvalidArgument("bad name".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("device x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: ApiError = StoreError::NotFound {
            entity: "device",
            id: "dev-1".into(),
        }
        .into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn unhandled_store_errors_become_internal() {
        let err: ApiError = StoreError::CodeExpired.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
