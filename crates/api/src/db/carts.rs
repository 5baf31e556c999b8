//! Cart repository.
//!
//! One `shop.cart_line` row per (user, product). Rows never hold a quantity
//! below one; setting a line to zero deletes it instead.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use mercato_core::{Money, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::CartLine;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: i64,
    name: String,
    image_url: Option<String>,
    price: Money,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let line_total = row.price.times(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "cart line for product {} has no valid total: {e}",
                row.product_id
            ))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            image_url: row.image_url,
            unit_price: row.price,
            quantity: row.quantity,
            line_total,
            added_at: row.added_at,
        })
    }
}

/// Repository for per-user carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add `quantity` of a product, summing with any existing line.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the product doesn't exist.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let quantity: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.cart_line (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = shop.cart_line.quantity + EXCLUDED.quantity
            RETURNING quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(quantity)
    }

    /// Overwrite a line's quantity, creating the line if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the product doesn't exist.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.cart_line (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete one line. Returns whether a line existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.cart_line
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every line in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::clear_in(&mut conn, user_id).await
    }

    /// Delete every line in the user's cart on the given connection.
    ///
    /// Checkout calls this inside its transaction so the cart only empties
    /// if the order commits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_in(conn: &mut PgConnection, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Read the cart joined with current catalog data, oldest line first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT c.product_id, p.name, p.image_url, p.price, c.quantity, c.added_at
            FROM shop.cart_line c
            JOIN shop.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.added_at, c.product_id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }
}
