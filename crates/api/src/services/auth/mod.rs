//! Authentication service.
//!
//! Password login, the TOTP second step, registration and the admin flag.
//! A session is only minted once every enabled factor has been checked.

pub mod attempts;
mod error;
mod password;
pub mod token;

pub use attempts::CodeAttemptLimiter;
pub use error::AuthError;
pub use password::{MIN_PASSWORD_LENGTH, verify_password};
pub use token::{IssuedToken, TokenError, TokenIssuer};

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;

use mercato_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::{EMAIL_CONSTRAINT, USERNAME_CONSTRAINT, UserRepository};
use crate::models::user::{User, Username};
use crate::services::two_factor::totp::{self, TotpSecret};

use password::{hash_password, validate_password};

/// An established session: a signed token and the user it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Result of the password step.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// No second factor configured; the session is ready.
    Authenticated(Session),
    /// Password accepted, but a TOTP code is still needed. No token yet.
    TwoFactorRequired { user_id: UserId },
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenIssuer,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenIssuer) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new user and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `AuthError::InvalidEmail` /
    /// `AuthError::WeakPassword` for bad input.
    /// Returns `AuthError::UserAlreadyExists` if the username or email is taken.
    #[instrument(skip(self, email, password), fields(username = %username))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(username.as_str(), &email, &password_hash)
            .await
            .map_err(|e| match e {
                e if e.is_conflict_on(USERNAME_CONSTRAINT) => {
                    AuthError::UserAlreadyExists("username")
                }
                e if e.is_conflict_on(EMAIL_CONSTRAINT) => AuthError::UserAlreadyExists("email"),
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists("account"),
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.session_for(user)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Check email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong; the two cases are indistinguishable.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = self
            .users
            .get_credentials_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, credentials.password_hash.expose_secret())?;

        if credentials.user.two_factor_enabled {
            tracing::info!(user_id = %credentials.user.id, "Password accepted, awaiting TOTP code");
            return Ok(LoginOutcome::TwoFactorRequired {
                user_id: credentials.user.id,
            });
        }

        Ok(LoginOutcome::Authenticated(
            self.session_for(credentials.user)?,
        ))
    }

    /// Finish a login that required a TOTP code.
    ///
    /// Every call spends one of the user's attempts in `attempts`, before
    /// anything is looked up.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TooManyAttempts` once the user's budget is spent.
    /// Returns `AuthError::InvalidCredentials` if the user is unknown, has no
    /// second factor, or the code is wrong.
    #[instrument(skip(self, code, attempts), fields(user_id = %user_id))]
    pub async fn complete_two_factor_login(
        &self,
        user_id: UserId,
        code: &str,
        attempts: &CodeAttemptLimiter,
    ) -> Result<Session, AuthError> {
        if !attempts.try_acquire(user_id) {
            tracing::warn!(user_id = %user_id, "TOTP login throttled");
            return Err(AuthError::TooManyAttempts);
        }

        let credentials = self
            .users
            .get_credentials_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(stored) = credentials.two_factor_secret.as_ref() else {
            return Err(AuthError::InvalidCredentials);
        };
        let secret = TotpSecret::from_base32(stored.expose_secret()).map_err(|e| {
            AuthError::Repository(RepositoryError::DataCorruption(format!(
                "stored TOTP secret for user {user_id} is unusable: {e}"
            )))
        })?;

        if !secret.verify(code, totp::unix_now()) {
            tracing::warn!(user_id = %user_id, "Rejected TOTP code at login");
            return Err(AuthError::InvalidCredentials);
        }

        self.session_for(credentials.user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Admin Flag
    // =========================================================================

    /// Grant or revoke another user's admin flag.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SelfRoleChange` if `actor` and `target` are the same.
    /// Returns `AuthError::UserNotFound` if the target doesn't exist.
    #[instrument(skip(self), fields(actor = %actor, target = %target))]
    pub async fn set_admin(
        &self,
        actor: UserId,
        target: UserId,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        if actor == target {
            return Err(AuthError::SelfRoleChange);
        }

        let user = self
            .users
            .set_admin(target, is_admin)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(is_admin, "Admin flag updated");
        Ok(user)
    }

    fn session_for(&self, user: User) -> Result<Session, AuthError> {
        let IssuedToken { token, expires_at } = self.tokens.issue(user.id, &user.username)?;
        Ok(Session {
            token,
            expires_at,
            user,
        })
    }
}
