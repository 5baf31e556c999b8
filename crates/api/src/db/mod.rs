//! Database operations for the shop `PostgreSQL` schema.
//!
//! # Schema: `shop`
//!
//! ## Tables
//!
//! - `user` - Accounts, admin flag and TOTP two-factor state
//! - `product` - Catalog with current prices
//! - `address` - Saved shipping/billing addresses, reused on exact match
//! - `cart_line` - Persisted cart contents per user
//! - `order` - Placed orders (unique payment confirmation id)
//! - `order_line` - Order lines with prices frozen at checkout
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p mercato-cli -- migrate
//! ```
//!
//! # Errors
//!
//! Every repository returns [`RepositoryError`]. Raw `sqlx` errors are
//! classified once, in the `From` impl, so callers match on meaning
//! (conflict, foreign key, timeout, out of range) rather than on SQLSTATE codes.

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod products;
pub mod users;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

use crate::config::DatabaseSettings;

/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";

/// SQLSTATE raised when a value does not fit its `NUMERIC` column.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Any other database failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// The statement timeout fired or no pooled connection became free in time.
    #[error("database operation timed out")]
    Timeout,

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A foreign key rejected the write. Carries the constraint name.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    /// A value did not fit its column (e.g. an amount above `NUMERIC(12,2)`).
    #[error("value out of range")]
    OutOfRange,

    /// Data in the database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl RepositoryError {
    /// Whether this is a unique violation on the named constraint.
    #[must_use]
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, Self::Conflict(name) if name == constraint)
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.constraint().unwrap_or("unique").to_owned())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                Self::ForeignKey(db_err.constraint().unwrap_or("foreign_key").to_owned())
            }
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(QUERY_CANCELED) =>
            {
                Self::Timeout
            }
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) =>
            {
                Self::OutOfRange
            }
            other => Self::Database(other),
        }
    }
}

/// Create a `PostgreSQL` connection pool.
///
/// Every connection is opened with `statement_timeout` set to
/// `settings.query_timeout`, so no single statement can hold a connection (or
/// a transaction's locks) longer than that.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `settings` - Pool sizing and timeouts
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be
/// established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    settings: &DatabaseSettings,
) -> Result<PgPool, sqlx::Error> {
    let statement_timeout = settings.query_timeout.as_millis().to_string();
    let options = database_url
        .expose_secret()
        .parse::<PgConnectOptions>()?
        .options([("statement_timeout", statement_timeout.as_str())]);

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.max_connections.min(2))
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_classified_as_timeout() {
        let err = RepositoryError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RepositoryError::Timeout));
    }

    #[test]
    fn test_row_not_found_is_classified_as_not_found() {
        let err = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[test]
    fn test_other_errors_stay_database_errors() {
        let err = RepositoryError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[test]
    fn test_is_conflict_on_matches_constraint_name() {
        let err = RepositoryError::Conflict("user_email_key".to_owned());
        assert!(err.is_conflict_on("user_email_key"));
        assert!(!err.is_conflict_on("user_username_key"));
        assert!(!RepositoryError::NotFound.is_conflict_on("user_email_key"));
    }
}
