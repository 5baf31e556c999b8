//! Two-factor enrollment and removal.
//!
//! A user moves Disabled → (generate) → pending → (verify) → Enabled →
//! (disable with password) → Disabled. The pending secret lives only with
//! the client until a correct code proves the authenticator has it; only
//! then is it written, together with the enabled flag, in one transaction.

mod error;
pub mod totp;

pub use error::TwoFactorError;
pub use totp::TotpSecret;

use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;

use mercato_core::UserId;

use crate::db::users::UserRepository;
use crate::services::auth::verify_password;

/// A freshly generated, not yet persisted, secret.
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    /// Unpadded base32 secret for manual entry; sent back on enable.
    pub secret: String,
    /// `otpauth://` URI to render as a QR code.
    pub otpauth_uri: String,
}

/// Two-factor service.
pub struct TwoFactorService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
    issuer: &'a str,
}

impl<'a> TwoFactorService<'a> {
    /// Create a new two-factor service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, issuer: &'a str) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            issuer,
        }
    }

    /// Generate a candidate secret and its enrollment URI.
    ///
    /// Nothing is written. Calling this again simply yields a new candidate.
    ///
    /// # Errors
    ///
    /// Returns `TwoFactorError::UserNotFound` if the user doesn't exist.
    /// Returns `TwoFactorError::AlreadyEnabled` if two-factor is already on.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn generate_secret(&self, user_id: UserId) -> Result<Enrollment, TwoFactorError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(TwoFactorError::UserNotFound)?;

        if user.two_factor_enabled {
            return Err(TwoFactorError::AlreadyEnabled);
        }

        let secret = TotpSecret::generate();
        Ok(Enrollment {
            otpauth_uri: secret.provisioning_uri(self.issuer, &user.username),
            secret: secret.to_base32(),
        })
    }

    /// Verify a code against a candidate secret and, if it matches, persist
    /// the secret and enable two-factor atomically.
    ///
    /// # Errors
    ///
    /// Returns `TwoFactorError::InvalidSecret` if the candidate is not a valid secret.
    /// Returns `TwoFactorError::AlreadyEnabled` if two-factor is already on.
    /// Returns `TwoFactorError::InvalidCode` if the code doesn't match; nothing is written.
    #[instrument(skip(self, candidate_secret, code), fields(user_id = %user_id))]
    pub async fn verify_and_enable(
        &self,
        user_id: UserId,
        candidate_secret: &str,
        code: &str,
    ) -> Result<(), TwoFactorError> {
        let secret = TotpSecret::from_base32(candidate_secret)?;
        if !totp::is_well_formed(code.trim()) {
            return Err(TwoFactorError::InvalidCode);
        }

        let mut tx = self.pool.begin().await?;

        let state = UserRepository::lock_two_factor_state(&mut tx, user_id)
            .await?
            .ok_or(TwoFactorError::UserNotFound)?;
        if state.enabled {
            return Err(TwoFactorError::AlreadyEnabled);
        }
        if !secret.verify(code, totp::unix_now()) {
            return Err(TwoFactorError::InvalidCode);
        }

        UserRepository::enable_two_factor(&mut tx, user_id, &secret.to_base32()).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Two-factor authentication enabled");
        Ok(())
    }

    /// Disable two-factor after re-checking the account password.
    ///
    /// Succeeds without writing if two-factor is already off.
    ///
    /// # Errors
    ///
    /// Returns `TwoFactorError::PasswordMismatch` if the password is wrong; nothing is written.
    /// Returns `TwoFactorError::UserNotFound` if the user doesn't exist.
    #[instrument(skip(self, password), fields(user_id = %user_id))]
    pub async fn disable(&self, user_id: UserId, password: &str) -> Result<(), TwoFactorError> {
        let mut tx = self.pool.begin().await?;

        let state = UserRepository::lock_two_factor_state(&mut tx, user_id)
            .await?
            .ok_or(TwoFactorError::UserNotFound)?;

        if verify_password(password, state.password_hash.expose_secret()).is_err() {
            tracing::warn!(user_id = %user_id, "Two-factor disable rejected: wrong password");
            return Err(TwoFactorError::PasswordMismatch);
        }
        if !state.enabled {
            return Ok(());
        }

        UserRepository::disable_two_factor(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Two-factor authentication disabled");
        Ok(())
    }
}
