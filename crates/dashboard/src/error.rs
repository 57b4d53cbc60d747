//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures the
//! programming-failure class to Sentry before responding to the client.
//! Expected operating conditions (no identity, transient backend failures,
//! malformed local records) never reach Sentry - they are policy, not bugs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use aduana_identity::{BackendError, CompanyError, StoreError};

/// Application-level error type for the dashboard.
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote identity service operation failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Company read/write failed.
    #[error("Company error: {0}")]
    Company(#[from] CompanyError),

    /// Local store operation failed.
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    /// Visitor is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Only the programming-failure class is captured to Sentry.
        if matches!(self, Self::Internal(_) | Self::Store(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Backend(BackendError::Unauthorized) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Company(CompanyError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Company(CompanyError::Backend(_)) => StatusCode::BAD_GATEWAY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Backend(BackendError::Unauthorized) => "Invalid or expired session".to_owned(),
            Self::Backend(_) | Self::Company(CompanyError::Backend(_)) => {
                "External service error".to_owned()
            }
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_owned(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
