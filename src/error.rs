//! Error types for the Wayfarer service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Fixed client-facing message for rejected requests.
pub const RATE_LIMIT_DETAIL: &str = "Too many requests. Please try again later.";

/// Main error type for Wayfarer operations.
#[derive(Error, Debug)]
pub enum WayfarerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Admission denied by a rate limiter
    #[error("Too many requests")]
    RateLimited,

    /// Request payload failed validation
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Requested history record does not exist
    #[error("Query not found")]
    NotFound,

    /// Upstream AI model failures (transport, API error, bad envelope)
    #[error("Advisor error: {0}")]
    Advisor(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Faults with no richer classification (e.g. a panicked worker task)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Wayfarer operations.
pub type Result<T> = std::result::Result<T, WayfarerError>;

impl WayfarerError {
    /// The HTTP status this error maps to at the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WayfarerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            WayfarerError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            WayfarerError::NotFound => StatusCode::NOT_FOUND,
            WayfarerError::Advisor(_) => StatusCode::BAD_GATEWAY,
            WayfarerError::Config(_)
            | WayfarerError::Database(_)
            | WayfarerError::Io(_)
            | WayfarerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WayfarerError {
    /// Render the error as the JSON body the frontend consumes:
    /// `{"detail": "..."}` with the matching status code.
    ///
    /// Internal faults (database, I/O, config) are logged and replaced with
    /// a generic message so details never reach the client.
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = match &self {
            WayfarerError::RateLimited => RATE_LIMIT_DETAIL.to_string(),
            WayfarerError::NotFound => "Query not found".to_string(),
            WayfarerError::InvalidQuery(msg) => msg.clone(),
            WayfarerError::Advisor(msg) => msg.clone(),
            WayfarerError::Config(_)
            | WayfarerError::Database(_)
            | WayfarerError::Io(_)
            | WayfarerError::Internal(_) => {
                error!(error = %self, "Internal error while handling request");
                "An unexpected error occurred".to_string()
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WayfarerError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(WayfarerError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            WayfarerError::InvalidQuery("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WayfarerError::Advisor("upstream down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            WayfarerError::Config("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_is_never_a_server_fault() {
        let status = WayfarerError::RateLimited.status_code();
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
