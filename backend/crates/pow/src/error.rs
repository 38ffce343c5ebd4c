//! PoW Error Types
//!
//! This module provides PoW-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// PoW-specific result type alias
pub type PowResult<T> = Result<T, PowError>;

/// PoW-specific error variants
///
/// Every variant except `Database` and `Internal` is something an agent
/// can react to, so each carries a stable `code()`.
#[derive(Debug, Error)]
pub enum PowError {
    /// Malformed input, rejected before any hashing
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Challenge not found")]
    ChallengeNotFound,

    /// Challenge has expired (TTL exceeded)
    #[error("Challenge expired")]
    ChallengeExpired,

    /// Hash does not meet difficulty
    #[error("Invalid proof: hash does not meet difficulty requirement")]
    ProofInvalid,

    /// Another request already redeemed this challenge
    #[error("Proof already used")]
    ProofAlreadyUsed,

    /// Challenge was issued for a different key, action kind or purpose
    #[error("Challenge was issued for a different action")]
    ActionMismatch,

    /// Server-side mining gave up within its budget
    #[error("Mining timed out after {attempts} attempts")]
    MiningTimedOut { attempts: u64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PowError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PowError::Validation(_) => ErrorKind::BadRequest,
            PowError::ChallengeNotFound
            | PowError::ChallengeExpired
            | PowError::ProofInvalid
            | PowError::ProofAlreadyUsed
            | PowError::ActionMismatch => ErrorKind::Unauthorized,
            PowError::MiningTimedOut { .. } => ErrorKind::ServiceUnavailable,
            PowError::Database(_) | PowError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            PowError::Validation(_) => "VALIDATION_FAILED",
            PowError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            PowError::ChallengeExpired => "CHALLENGE_EXPIRED",
            PowError::ProofInvalid => "PROOF_INVALID",
            PowError::ProofAlreadyUsed => "PROOF_ALREADY_USED",
            PowError::ActionMismatch => "ACTION_MISMATCH",
            PowError::MiningTimedOut { .. } => "MINING_TIMED_OUT",
            PowError::Database(_) | PowError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            PowError::Database(e) => {
                tracing::error!(error = %e, "PoW database error");
            }
            PowError::Internal(msg) => {
                tracing::error!(message = %msg, "PoW internal error");
            }
            PowError::MiningTimedOut { attempts } => {
                tracing::error!(attempts = attempts, "PoW mining budget exhausted");
            }
            PowError::ProofInvalid | PowError::ProofAlreadyUsed | PowError::ActionMismatch => {
                tracing::warn!(code = self.code(), "PoW proof rejected");
            }
            _ => {
                tracing::debug!(error = %self, "PoW error");
            }
        }
    }
}

impl From<PowError> for AppError {
    fn from(err: PowError) -> Self {
        let app = AppError::new(err.kind(), err.to_string()).with_code(err.code());
        match err {
            PowError::Database(e) => app.with_source(e),
            _ => app,
        }
    }
}
