//! Admin flag management.
//!
//! The first admin has to be created here, since only an admin can grant
//! the flag over the API.

use mercato_api::db::{RepositoryError, UserRepository};
use mercato_core::{Email, EmailError};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connection(#[from] super::ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No user with email: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Set or clear the admin flag of the user with `email`.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no account uses the email.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let pool = super::connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    let user = users
        .set_admin(user.id, is_admin)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        is_admin = user.is_admin,
        "Admin flag updated"
    );
    Ok(())
}
