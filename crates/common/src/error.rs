//! Error types for univote.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The poll is closed or its deadline has passed. Not retryable
    /// until an administrator re-opens the poll.
    #[error("Poll is closed or has expired")]
    PollClosed,

    /// The submitted ballot does not fit the poll (wrong option count
    /// for the poll type, or options that belong to another poll).
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A ledger entry for this (user, poll) pair already exists. The
    /// prior vote stands.
    #[error("You have already voted on this poll")]
    DuplicateVote,

    /// A settings update would leave an active poll with a deadline in
    /// the past.
    #[error("Poll deadline is in the past")]
    DeadlineInPast,

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_)
            | Self::Validation(_)
            | Self::PollClosed
            | Self::InvalidSelection(_)
            | Self::DeadlineInPast => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::DuplicateVote => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::PollClosed => "POLL_CLOSED",
            Self::InvalidSelection(_) => "INVALID_SELECTION",
            Self::DuplicateVote => "DUPLICATE_VOTE",
            Self::DeadlineInPast => "DEADLINE_IN_PAST",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Whether the client may safely retry the request that produced
    /// this error. Storage failures are retryable because vote
    /// application is idempotent per (user, poll).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors with detail; clients get a generic message.
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let message = if self.is_server_error() {
            "Server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_status_codes() {
        assert_eq!(
            AppError::NotFound("poll".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::PollClosed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidSelection("too many".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::DuplicateVote.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::DeadlineInPast.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AppError::PollClosed.error_code(), "POLL_CLOSED");
        assert_eq!(AppError::DuplicateVote.error_code(), "DUPLICATE_VOTE");
        assert_eq!(AppError::DeadlineInPast.error_code(), "DEADLINE_IN_PAST");
        assert_eq!(
            AppError::InvalidSelection(String::new()).error_code(),
            "INVALID_SELECTION"
        );
    }

    #[test]
    fn test_only_server_errors_are_retryable() {
        assert!(AppError::Database("timeout".into()).is_retryable());
        assert!(!AppError::DuplicateVote.is_retryable());
        assert!(!AppError::PollClosed.is_retryable());
    }

    #[test]
    fn test_server_error_detection() {
        assert!(AppError::Database("boom".into()).is_server_error());
        assert!(!AppError::Unauthorized.is_server_error());
    }
}
