//! Structured error types with machine-readable codes
//!
//! A cache miss is not an error (it is `None`); everything else that can go
//! wrong in the core or at the request boundary is an [`AppError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    // Validation Errors (400)
    InvalidInput { field: String, reason: String },
    InvalidUserId(String),
    InvalidMood(String),

    /// Malformed behavior event. Recovered locally: the event is dropped.
    InvalidEvent(String),

    /// Caller deadline or abort tripped during scoring. Never carries a
    /// partial ranking.
    Cancelled,

    /// The cache absorbs this through eviction; it only exists so a broken
    /// invariant has a name if it ever surfaces.
    CapacityExceeded { capacity: usize },

    // Collaborator failures (503)
    CatalogUnavailable(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidUserId(_) => "INVALID_USER_ID",
            Self::InvalidMood(_) => "INVALID_MOOD",
            Self::InvalidEvent(_) => "INVALID_EVENT",
            Self::Cancelled => "CANCELLED",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::CatalogUnavailable(_) => "CATALOG_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. }
            | Self::InvalidUserId(_)
            | Self::InvalidMood(_)
            | Self::InvalidEvent(_) => StatusCode::BAD_REQUEST,

            Self::Cancelled | Self::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,

            Self::CapacityExceeded { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::InvalidUserId(msg) => format!("Invalid user ID: {msg}"),
            Self::InvalidMood(mood) => format!(
                "Invalid mood '{mood}'. Valid moods are: {}",
                crate::personalization::mood::Mood::ALL
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::InvalidEvent(reason) => format!("Invalid behavior event: {reason}"),
            Self::Cancelled => "Scoring cancelled before completion".to_string(),
            Self::CapacityExceeded { capacity } => {
                format!("Cache capacity exceeded (capacity: {capacity})")
            }
            Self::CatalogUnavailable(msg) => format!("Recipe catalog unavailable: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();

        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", body.message);
        }

        (status, Json(body)).into_response()
    }
}

/// Helper trait to convert validation errors
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidInput {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::InvalidUserId("x".to_string()).code(), "INVALID_USER_ID");
        assert_eq!(AppError::InvalidEvent("empty".to_string()).code(), "INVALID_EVENT");
        assert_eq!(AppError::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidMood("grumpy".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Cancelled.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::CapacityExceeded { capacity: 4 }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_mood_lists_valid_moods() {
        let message = AppError::InvalidMood("grumpy".to_string()).message();
        assert!(message.contains("grumpy"));
        assert!(message.contains("comfort"));
        assert!(message.contains("light"));
    }

    #[test]
    fn test_validation_ext_maps_field() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("must be positive"));
        match res.map_validation_err("limit") {
            Err(AppError::InvalidInput { field, reason }) => {
                assert_eq!(field, "limit");
                assert!(reason.contains("positive"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
