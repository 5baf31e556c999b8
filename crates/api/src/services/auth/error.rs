//! Authentication error types.

use thiserror::Error;

use super::token::TokenError;
use crate::db::RepositoryError;
use crate::models::user::UsernameError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] mercato_core::EmailError),

    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// Invalid credentials (wrong password, wrong code or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Too many TOTP codes tried for this user; wait for the budget to refill.
    #[error("too many attempts")]
    TooManyAttempts,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Username or email already taken. Carries the field name.
    #[error("{0} is already registered")]
    UserAlreadyExists(&'static str),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// An admin tried to change their own admin flag.
    #[error("admins cannot change their own admin flag")]
    SelfRoleChange,

    /// Session token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
