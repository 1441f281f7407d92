// Domain and call-boundary error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::database::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds returned by every core operation.
///
/// Domain code returns the most specific kind; the call boundary maps each
/// kind to exactly one HTTP status through [`Error::status_code`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid param: {0}")]
    InvalidParam(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The reason is for server-side logs only and never reaches the client.
    #[error("authentication error")]
    Authentication { reason: &'static str },

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Error::InvalidParam(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Error::AlreadyExists(message.into())
    }

    pub fn authentication(reason: &'static str) -> Self {
        tracing::debug!(reason, "authentication rejected");
        Error::Authentication { reason }
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Error::Unimplemented(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidParam(_) | Error::InvalidFormat(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Error::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidParam(_) => "INVALID_PARAM",
            Error::InvalidFormat(_) => "INVALID_FORMAT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::Authentication { .. } => "UNAUTHENTICATED",
            Error::Unimplemented(_) => "UNIMPLEMENTED",
            Error::Internal(_) => "INTERNAL",
        }
    }

    /// Text safe to show a client. Backend and storage detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Error::Internal(_) => "internal error".to_string(),
            Error::InvalidFormat(_) => "invalid format".to_string(),
            _ => self.to_string(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.client_message(),
            "code": self.error_code()
        })
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Error::NotFound(msg),
            StoreError::AlreadyExists(msg) => Error::AlreadyExists(msg),
            StoreError::InvalidFormat(msg) => {
                tracing::error!("stored document has invalid format: {}", msg);
                Error::InvalidFormat(msg)
            }
            StoreError::Backend(msg) => {
                tracing::error!("persistence backend error: {}", msg);
                Error::Internal(msg)
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        if let Error::Internal(detail) | Error::InvalidFormat(detail) = &self {
            tracing::error!(code = self.error_code(), "call failed: {}", detail);
        }
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
