//! Error taxonomy shared across the workspace.
//!
//! Services return these typed variants; only the HTTP layer maps them
//! to status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefugeError {
    /// A cooldown window has not elapsed yet.
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    /// Token malformed, already used, expired, or of the wrong purpose.
    /// Deliberately carries no detail — the caller must not learn which
    /// check failed.
    #[error("invalid or expired token")]
    Invalid,

    /// Missing, malformed, or expired credential.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but the caller's role is not in the allowed set.
    #[error("forbidden")]
    Forbidden,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for RefugeError {
    fn from(err: anyhow::Error) -> Self {
        RefugeError::Internal(err.to_string())
    }
}

pub type RefugeResult<T> = Result<T, RefugeError>;
