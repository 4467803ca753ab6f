//! Response envelopes.
//!
//! ```text
//! success   200 {"data": <backend result>}
//! failure   <status> {"status": <status>, "data": {"message": "..."}}
//! rejected  403 {"message": "Not authorized"}
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use poolgate_core::ClassifiedError;

/// Message returned for every rejected token.
pub const NOT_AUTHORIZED: &str = "Not authorized";

/// Successful operation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Backend result, unmodified.
    pub data: Value,
}

impl ApiResponse {
    /// Wrap a backend result.
    #[must_use]
    pub const fn new(data: Value) -> Self {
        Self { data }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Classified backend failure or rejected input.
    Classified(ClassifiedError),
    /// Token rejected by the verifier.
    NotAuthorized,
}

impl ApiError {
    /// Input rejected before any backend call.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Classified(ClassifiedError::bad_request(message))
    }

    /// Generic server-side failure.
    #[must_use]
    pub fn internal() -> Self {
        Self::Classified(ClassifiedError::internal())
    }
}

impl From<ClassifiedError> for ApiError {
    fn from(error: ClassifiedError) -> Self {
        Self::Classified(error)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    data: MessageBody<'a>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Classified(error) => {
                let status = StatusCode::from_u16(error.status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = ErrorBody {
                    status: status.as_u16(),
                    data: MessageBody {
                        message: &error.message,
                    },
                };
                (status, Json(body)).into_response()
            }
            Self::NotAuthorized => (
                StatusCode::FORBIDDEN,
                Json(MessageBody {
                    message: NOT_AUTHORIZED,
                }),
            )
                .into_response(),
        }
    }
}
