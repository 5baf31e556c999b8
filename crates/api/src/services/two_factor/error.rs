//! Two-factor error types.

use thiserror::Error;

use super::totp::SecretError;
use crate::db::RepositoryError;

/// Errors that can occur while enrolling or removing a second factor.
#[derive(Debug, Error)]
pub enum TwoFactorError {
    /// Two-factor is already on; it must be disabled before re-enrolling.
    #[error("two-factor authentication is already enabled")]
    AlreadyEnabled,

    /// The candidate secret could not be parsed.
    #[error("invalid secret: {0}")]
    InvalidSecret(#[from] SecretError),

    /// The code did not match the secret.
    #[error("invalid verification code")]
    InvalidCode,

    /// The password confirmation for disabling did not match.
    #[error("password confirmation failed")]
    PasswordMismatch,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for TwoFactorError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}
