//! User repository for database operations.
//!
//! Covers accounts, the admin flag and the persisted half of the TOTP
//! two-factor state machine. The two-factor writes take a connection rather
//! than the pool so they run inside the caller's transaction, after
//! [`UserRepository::lock_two_factor_state`] has locked the row.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::{PgConnection, PgPool};

use mercato_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{User, UserCredentials};

/// Unique constraint on `shop.user.username`.
pub const USERNAME_CONSTRAINT: &str = "user_username_key";
/// Unique constraint on `shop.user.email`.
pub const EMAIL_CONSTRAINT: &str = "user_email_key";

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    is_admin: bool,
    two_factor_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            email,
            is_admin: row.is_admin,
            two_factor_enabled: row.two_factor_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
    two_factor_secret: Option<String>,
}

impl TryFrom<CredentialsRow> for UserCredentials {
    type Error = RepositoryError;

    fn try_from(row: CredentialsRow) -> Result<Self, Self::Error> {
        if row.user.two_factor_enabled != row.two_factor_secret.is_some() {
            return Err(RepositoryError::DataCorruption(format!(
                "user {} has two_factor_enabled={} but secret present={}",
                row.user.id,
                row.user.two_factor_enabled,
                row.two_factor_secret.is_some()
            )));
        }

        Ok(Self {
            user: User::try_from(row.user)?,
            password_hash: SecretString::from(row.password_hash),
            two_factor_secret: row.two_factor_secret.map(SecretString::from),
        })
    }
}

/// Two-factor state read under a row lock.
pub struct LockedTwoFactorState {
    pub enabled: bool,
    pub password_hash: SecretString,
}

#[derive(sqlx::FromRow)]
struct TwoFactorStateRow {
    two_factor_enabled: bool,
    password_hash: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, is_admin, two_factor_enabled, created_at, updated_at
            FROM shop."user"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, is_admin, two_factor_enabled, created_at, updated_at
            FROM shop."user"
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their secrets by email, for password login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the two-factor columns disagree.
    pub async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let row: Option<CredentialsRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, is_admin, two_factor_enabled, created_at, updated_at,
                   password_hash, two_factor_secret
            FROM shop."user"
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserCredentials::try_from).transpose()
    }

    /// Get a user and their secrets by ID, for the second login step.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the two-factor columns disagree.
    pub async fn get_credentials_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let row: Option<CredentialsRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, is_admin, two_factor_enabled, created_at, updated_at,
                   password_hash, two_factor_secret
            FROM shop."user"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserCredentials::try_from).transpose()
    }

    /// Create a new user with a password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming [`USERNAME_CONSTRAINT`] or
    /// [`EMAIL_CONSTRAINT`] if either is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO shop."user" (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, is_admin, two_factor_enabled, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await?;

        User::try_from(row)
    }

    /// Set or clear the admin flag.
    ///
    /// Returns `None` if the user doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_admin(
        &self,
        id: UserId,
        is_admin: bool,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            UPDATE shop."user"
            SET is_admin = $2
            WHERE id = $1
            RETURNING id, username, email, is_admin, two_factor_enabled, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(is_admin)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    // =========================================================================
    // Two-factor state (transaction-scoped)
    // =========================================================================

    /// Lock the user's row and read its two-factor state.
    ///
    /// The lock is held until the surrounding transaction ends, so concurrent
    /// enable/disable requests for the same user run one after the other.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_two_factor_state(
        conn: &mut PgConnection,
        id: UserId,
    ) -> Result<Option<LockedTwoFactorState>, RepositoryError> {
        let row: Option<TwoFactorStateRow> = sqlx::query_as(
            r#"
            SELECT two_factor_enabled, password_hash
            FROM shop."user"
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| LockedTwoFactorState {
            enabled: r.two_factor_enabled,
            password_hash: SecretString::from(r.password_hash),
        }))
    }

    /// Persist a verified secret and turn two-factor on in one statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn enable_two_factor(
        conn: &mut PgConnection,
        id: UserId,
        secret_base32: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE shop."user"
            SET two_factor_enabled = TRUE, two_factor_secret = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(secret_base32)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Clear the secret and turn two-factor off in one statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn disable_two_factor(
        conn: &mut PgConnection,
        id: UserId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE shop."user"
            SET two_factor_enabled = FALSE, two_factor_secret = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
