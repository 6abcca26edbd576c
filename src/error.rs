//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::domain::DomainError;
use crate::reports::ReportError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing, malformed, unknown or expired credential
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Storage error")]
    Store(StoreError),

    #[error("Report rendering failed")]
    Report(#[from] ReportError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Not authenticated".to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InUse(msg) => AppError::Conflict(msg),
            StoreError::Duplicate(field) => AppError::InvalidRequest(format!("{} already exists.", field)),
            other => AppError::Store(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::UsernameTaken | AuthError::EmailTaken => {
                AppError::InvalidRequest(err.to_string())
            }
            AuthError::Password(e) => AppError::Internal(e.to_string()),
            AuthError::Domain(e) => AppError::Domain(e),
            AuthError::Store(e) => AppError::from(e),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(err))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request", None),

            // 401 Unauthorized
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", None),

            // 403 Forbidden
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", None),

            // 404 Not Found
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),

            // 409 Conflict
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::BookNotFound(id) => {
                    (StatusCode::NOT_FOUND, "book_not_found", Some(id.to_string()))
                }
                DomainError::LoanNotFound(id) => {
                    (StatusCode::NOT_FOUND, "loan_not_found", Some(id.to_string()))
                }
                DomainError::UserNotFound(id) => {
                    (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
                }
                DomainError::NoCopiesAvailable { book_id } => (
                    StatusCode::BAD_REQUEST,
                    "no_copies_available",
                    Some(format!("book_id {}", book_id)),
                ),
                DomainError::AlreadyReturned { loan_id } => (
                    StatusCode::BAD_REQUEST,
                    "already_returned",
                    Some(format!("loan_id {}", loan_id)),
                ),
                DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", None),
                DomainError::InvalidVolumes(_) => (StatusCode::BAD_REQUEST, "invalid_volumes", None),
                DomainError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input", None),
            },

            // 500 Internal Server Error
            AppError::Store(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Report(e) => {
                tracing::error!("Report error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "report_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.status_and_code();

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}
