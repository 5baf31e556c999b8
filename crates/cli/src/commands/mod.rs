//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use mercato_api::config::DatabaseSettings;
use mercato_api::db;
use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Failure to reach the database.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Missing environment variable: MERCATO_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect using `MERCATO_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Loads `.env` first if present.
///
/// # Errors
///
/// Returns `ConnectError` if no URL is set or the database is unreachable.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("MERCATO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url, &DatabaseSettings::default()).await?)
}
