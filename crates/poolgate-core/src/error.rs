//! Error shapes shared between the backend client and the gateway.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code used when the backend could not be reached at all.
pub const NETWORKING_ERROR: &str = "NetworkingError";

/// An error reported by the identity backend.
///
/// The code space is defined by the backend (`UserNotFoundException`,
/// `CodeMismatchException`, ...); this type never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Backend error code.
    pub code: String,
    /// Backend-provided human readable message.
    pub message: String,
}

impl BackendError {
    /// Create a new backend error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error for a backend call that never produced a response.
    #[must_use]
    pub fn networking(message: impl Into<String>) -> Self {
        Self::new(NETWORKING_ERROR, message)
    }
}

/// The only error shape handed back to gateway callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status}: {message}")]
pub struct ClassifiedError {
    /// HTTP status to respond with.
    pub status: u16,
    /// Client-facing message.
    pub message: String,
}

impl ClassifiedError {
    /// Create a new classified error.
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Generic server-side failure.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(500, crate::classifier::FALLBACK_MESSAGE)
    }

    /// Input rejected before reaching the backend.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new("UserNotFoundException", "User does not exist.");
        assert_eq!(err.to_string(), "UserNotFoundException: User does not exist.");
    }

    #[test]
    fn test_networking_error_code() {
        let err = BackendError::networking("connection refused");
        assert_eq!(err.code, NETWORKING_ERROR);
    }

    #[test]
    fn test_internal_is_500() {
        let err = ClassifiedError::internal();
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "Something went wrong in the server");
    }
}
