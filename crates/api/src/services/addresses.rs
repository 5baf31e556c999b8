//! Shipping address resolution.
//!
//! Repeat customers usually ship to the same place, so checkout reuses an
//! existing row when every field matches and inserts one otherwise.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use mercato_core::{AddressId, AddressKind, UserId};

use crate::db::{AddressRepository, RepositoryError};
use crate::models::address::AddressFields;

/// Finds or creates shipping addresses.
pub struct AddressResolver<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressResolver<'a> {
    /// Create a new resolver.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a shipping address on a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store is unavailable.
    pub async fn resolve_shipping(
        &self,
        user_id: UserId,
        fields: &AddressFields,
    ) -> Result<AddressId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::resolve_shipping_in(&mut conn, user_id, fields).await
    }

    /// Resolve a shipping address on the caller's connection (usually a
    /// transaction). Performs at most one insert.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store is unavailable.
    #[instrument(skip(conn, fields), fields(user_id = %user_id))]
    pub async fn resolve_shipping_in(
        conn: &mut PgConnection,
        user_id: UserId,
        fields: &AddressFields,
    ) -> Result<AddressId, RepositoryError> {
        if let Some(id) =
            AddressRepository::find_matching(conn, user_id, AddressKind::Shipping, fields).await?
        {
            tracing::debug!(address_id = %id, "Reusing saved address");
            return Ok(id);
        }

        let address =
            AddressRepository::insert(conn, user_id, AddressKind::Shipping, fields).await?;
        tracing::debug!(address_id = %address.id, "Saved new address");
        Ok(address.id)
    }
}
