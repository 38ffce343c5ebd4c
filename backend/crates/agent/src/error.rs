//! Agent Error Types
//!
//! This module provides agent-specific error variants that integrate
//! with the unified `kernel::error::AppError` system. Proof failures
//! pass through from `pow` with their codes intact.

use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use pow::PowError;
use thiserror::Error;

use crate::domain::value_object::AgentNameError;

/// Agent-specific result type alias
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent-specific error variants
#[derive(Debug, Error)]
pub enum AgentError {
    /// Malformed or missing input
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Username is already taken")]
    UsernameTaken,

    /// Unknown key (also used for unknown secrets)
    #[error("Agent key not found")]
    KeyNotFound,

    /// Key has been revoked
    #[error("Agent key is inactive")]
    KeyInactive,

    /// No agent key presented
    #[error("Missing agent credential: {0}")]
    MissingCredential(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Receipt unknown, expired, already redeemed or for another action
    #[error("Action receipt is invalid or already used")]
    ReceiptInvalid,

    #[error("Admin token missing or invalid")]
    AdminUnauthorized,

    #[error(transparent)]
    Pow(#[from] PowError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Validation(_) => ErrorKind::BadRequest,
            AgentError::UsernameTaken => ErrorKind::Conflict,
            AgentError::KeyNotFound
            | AgentError::KeyInactive
            | AgentError::MissingCredential(_)
            | AgentError::ReceiptInvalid
            | AgentError::AdminUnauthorized => ErrorKind::Unauthorized,
            AgentError::RateLimitExceeded { .. } => ErrorKind::TooManyRequests,
            AgentError::Pow(e) => e.kind(),
            AgentError::Database(_) | AgentError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Validation(_) => "VALIDATION_FAILED",
            AgentError::UsernameTaken => "USERNAME_TAKEN",
            AgentError::KeyNotFound => "KEY_NOT_FOUND",
            AgentError::KeyInactive => "KEY_INACTIVE",
            AgentError::MissingCredential(_) => "MISSING_CREDENTIAL",
            AgentError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AgentError::ReceiptInvalid => "RECEIPT_INVALID",
            AgentError::AdminUnauthorized => "ADMIN_UNAUTHORIZED",
            AgentError::Pow(e) => e.code(),
            AgentError::Database(_) | AgentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AgentError::Database(e) => {
                tracing::error!(error = %e, "Agent database error");
            }
            AgentError::Internal(msg) => {
                tracing::error!(message = %msg, "Agent internal error");
            }
            AgentError::Pow(e) => e.log(),
            AgentError::KeyInactive => {
                tracing::warn!("Request with revoked agent key");
            }
            AgentError::RateLimitExceeded { retry_after_secs } => {
                tracing::warn!(retry_after_secs = retry_after_secs, "Agent rate limited");
            }
            AgentError::AdminUnauthorized => {
                tracing::warn!("Rejected admin request");
            }
            _ => {
                tracing::debug!(error = %self, "Agent error");
            }
        }
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Pow(e) => e.into(),
            AgentError::RateLimitExceeded { retry_after_secs } => {
                AppError::new(ErrorKind::TooManyRequests, "Rate limit exceeded")
                    .with_code("RATE_LIMIT_EXCEEDED")
                    .with_retry_after(retry_after_secs)
            }
            AgentError::Database(e) => AppError::new(ErrorKind::InternalServerError, "Database error")
                .with_code("INTERNAL_ERROR")
                .with_source(e),
            other => AppError::new(other.kind(), other.to_string()).with_code(other.code()),
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

impl From<AgentNameError> for AgentError {
    fn from(err: AgentNameError) -> Self {
        AgentError::Validation(err.to_string())
    }
}

impl From<platform::client::HeaderError> for AgentError {
    fn from(err: platform::client::HeaderError) -> Self {
        match err {
            platform::client::HeaderError::MissingHeader(header) => {
                AgentError::MissingCredential(header)
            }
        }
    }
}

impl From<JsonRejection> for AgentError {
    fn from(rejection: JsonRejection) -> Self {
        AgentError::Validation(rejection.body_text())
    }
}
