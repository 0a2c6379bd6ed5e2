//! # Pagination Errors
//!
//! Only client mistakes and exhausted fallbacks surface. Everything a
//! component can recover from is downgraded inside that component.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result type for pagination
pub type PaginateResult<T> = Result<T, PaginateError>;

/// Pagination errors
#[derive(Debug, Clone, Error)]
pub enum PaginateError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Invalid page, page size or descriptor shape
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Collection not in the registry
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Count or fetch failed after every fallback
    #[error("Pagination failed for '{collection}': {message}")]
    Internal { collection: String, message: String },

    /// Session acquisition or the transaction body ran out of time
    #[error("Pagination timed out for '{collection}' during {stage}")]
    Timeout { collection: String, stage: &'static str },
}

impl PaginateError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        PaginateError::BadRequest(message.into())
    }

    pub fn internal(collection: impl Into<String>, message: impl ToString) -> Self {
        PaginateError::Internal {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaginateError::BadRequest(_) | PaginateError::UnknownCollection(_) => StatusCode::BAD_REQUEST,
            PaginateError::Internal { .. } | PaginateError::Timeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<PaginateError> for ErrorResponse {
    fn from(err: PaginateError) -> Self {
        Self {
            code: err.status_code().as_u16(),
            error: err.to_string(),
        }
    }
}

impl IntoResponse for PaginateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::from(self));
        (status, body).into_response()
    }
}
