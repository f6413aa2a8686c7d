//! Response envelope and error mapping for the HTTP surface.
//!
//! Every response body is `{success, message, data?}`; errors add a
//! machine-readable `kind` so clients branch without parsing messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{DbErrorKind, LibraryError};

/// Standard success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Always true on this path; failures go through [`LibraryError`].
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Operation payload, omitted when there is nothing to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success with a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }

    /// Success without a payload.
    pub fn message_only(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: None,
        })
    }
}

/// Error envelope.
#[derive(Debug, Serialize)]
struct ApiError {
    success: bool,
    message: String,
    kind: &'static str,
}

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let status = match &self {
            LibraryError::BookNotFound(_)
            | LibraryError::StudentNotFound(_)
            | LibraryError::AllocationNotFound(_)
            | LibraryError::EntryNotFound(_) => StatusCode::NOT_FOUND,
            LibraryError::DuplicateRequest { .. } => StatusCode::CONFLICT,
            LibraryError::AlreadyReturned(_)
            | LibraryError::ClaimExpired(_)
            | LibraryError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            LibraryError::Database {
                kind: DbErrorKind::ConstraintViolation,
                ..
            } => StatusCode::CONFLICT,
            error @ (LibraryError::InvariantViolation { .. } | LibraryError::Database { .. }) => {
                tracing::error!(
                    error.message = %error,
                    "unexpected error surfaced to HTTP caller"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiError {
            success: false,
            message: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
