//! Database migration command.
//!
//! Applies every pending migration from `crates/api/migrations/`, which are
//! embedded into the binary at compile time.

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connection(#[from] super::ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = super::connect().await?;
    apply(&pool).await?;
    tracing::info!("Migrations complete!");
    Ok(())
}

/// Apply the embedded migrations to `pool`.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or was modified after being applied.
pub async fn apply(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(pool).await
}
