//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Only [`ServiceError::StorageUnavailable`] is produced by the field cipher
/// itself; the other variants describe problems at the transport edge.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::StorageUnavailable`] → 503
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed, e.g. an empty identity.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The durable key-storage medium cannot be opened or queried.
    ///
    /// This is actionable for the user (locked device, revoked permission)
    /// and must never be collapsed into an empty value.
    #[error("secure storage unavailable")]
    StorageUnavailable,

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::StorageUnavailable => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::StorageUnavailable => "storage_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_codes() {
        assert_eq!(ServiceError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ServiceError::StorageUnavailable.http_status(), 503);
        assert_eq!(ServiceError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn storage_unavailable_message_is_user_facing() {
        let e = ServiceError::StorageUnavailable;
        assert_eq!(e.to_string(), "secure storage unavailable");
        assert_eq!(e.code(), "storage_unavailable");
    }

    #[test]
    fn display_includes_message() {
        let e = ServiceError::BadRequest("identity must not be empty".into());
        assert!(e.to_string().contains("identity must not be empty"));
    }
}
