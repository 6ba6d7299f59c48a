// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// The four Google Calendar operations the adapter performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Insert,
    Update,
    Delete,
    List,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOperation::Insert => "insert",
            RemoteOperation::Update => "update",
            RemoteOperation::Delete => "delete",
            RemoteOperation::List => "list",
        };
        f.write_str(name)
    }
}

/// Why a remote calendar call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteApiCause {
    /// The remote event no longer exists (deleted out of band).
    NotFound,
    /// The access token was rejected (expired, revoked, insufficient scope).
    Unauthorized,
    /// 429 from the API.
    RateLimited,
    /// The HTTP client timed out before a response arrived.
    Timeout,
    /// Connection-level failure.
    Transport(String),
    /// Any other non-success API response.
    Api { status: u16, body: String },
}

impl fmt::Display for RemoteApiCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteApiCause::NotFound => f.write_str("remote event not found"),
            RemoteApiCause::Unauthorized => f.write_str("access token rejected"),
            RemoteApiCause::RateLimited => f.write_str("rate limited"),
            RemoteApiCause::Timeout => f.write_str("request timed out"),
            RemoteApiCause::Transport(msg) => write!(f, "transport error: {}", msg),
            RemoteApiCause::Api { status, body } => write!(f, "HTTP {}: {}", status, body),
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired session token")]
    InvalidSession,

    #[error("Insufficient role for this operation")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No Google credential stored for this user")]
    CredentialsUnavailable,

    #[error("Authorization code exchange failed: {0}")]
    TokenExchange(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Google Calendar {operation} failed: {cause}")]
    RemoteApi {
        operation: RemoteOperation,
        cause: RemoteApiCause,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand used throughout the calendar adapter.
    pub fn remote(operation: RemoteOperation, cause: RemoteApiCause) -> Self {
        AppError::RemoteApi { operation, cause }
    }

    /// True if this is a remote-calendar failure whose cause is a vanished
    /// remote event (stale local record).
    pub fn is_remote_not_found(&self) -> bool {
        matches!(
            self,
            AppError::RemoteApi {
                cause: RemoteApiCause::NotFound,
                ..
            }
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidSession => (StatusCode::UNAUTHORIZED, "invalid_session", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                Some(msg.clone()),
            ),
            AppError::CredentialsUnavailable => (
                StatusCode::CONFLICT,
                "credentials_unavailable",
                Some("connect a Google account first".to_string()),
            ),
            AppError::TokenExchange(msg) => (
                StatusCode::BAD_GATEWAY,
                "token_exchange_failed",
                Some(msg.clone()),
            ),
            AppError::TokenRefresh(msg) => (
                StatusCode::BAD_GATEWAY,
                "token_refresh_failed",
                Some(msg.clone()),
            ),
            AppError::RemoteApi { operation, cause } => (
                StatusCode::BAD_GATEWAY,
                "remote_calendar_error",
                Some(format!("{}: {}", operation, cause)),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_not_found_is_detectable() {
        let err = AppError::remote(RemoteOperation::Update, RemoteApiCause::NotFound);
        assert!(err.is_remote_not_found());

        let err = AppError::remote(RemoteOperation::Update, RemoteApiCause::RateLimited);
        assert!(!err.is_remote_not_found());

        assert!(!AppError::CredentialsUnavailable.is_remote_not_found());
    }

    #[test]
    fn status_codes_match_taxonomy() {
        let cases = [
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::InvalidSession, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden, StatusCode::FORBIDDEN),
            (AppError::NotFound("event x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("title".into()), StatusCode::BAD_REQUEST),
            (AppError::CredentialsUnavailable, StatusCode::CONFLICT),
            (
                AppError::TokenExchange("bad code".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::TokenRefresh("revoked".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::remote(RemoteOperation::List, RemoteApiCause::Timeout),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Database("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
