//! Order repository.
//!
//! Orders and their lines are written once, inside the checkout transaction,
//! through the connection-taking functions. After that only `status` (and
//! the `updated_at` trigger) ever changes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use mercato_core::{
    AddressId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::order::{Order, OrderLine, SnapshotLine};

/// Unique constraint on `shop.order.payment_confirmation_id`.
pub const PAYMENT_CONFIRMATION_CONSTRAINT: &str = "order_payment_confirmation_id_key";

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: OrderStatus,
    total: Money,
    shipping_address_id: i64,
    billing_address_id: i64,
    payment_confirmation_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            status: self.status,
            total: self.total,
            shipping_address_id: AddressId::new(self.shipping_address_id),
            billing_address_id: AddressId::new(self.billing_address_id),
            payment_confirmation_id: self.payment_confirmation_id,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: Money,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

/// Header fields for a new order. Status always starts as `Pending`.
#[derive(Debug, Clone)]
pub struct NewOrder<'o> {
    pub user_id: UserId,
    pub total: Money,
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    pub payment_confirmation_id: &'o str,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads and status updates.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, status, total, shipping_address_id, billing_address_id,
                   payment_confirmation_id, created_at, updated_at
            FROM shop."order"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.lines_for(&[row.id]).await?;
        let lines = lines.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_order(lines)))
    }

    /// List a user's orders with their lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, status, total, shipping_address_id, billing_address_id,
                   payment_confirmation_id, created_at, updated_at
            FROM shop."order"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut lines = self.lines_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_lines = lines.remove(&row.id).unwrap_or_default();
                row.into_order(order_lines)
            })
            .collect())
    }

    /// Overwrite an order's status.
    ///
    /// Any status may replace any other. Returns `None` if the order doesn't
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            UPDATE shop."order"
            SET status = $2
            WHERE id = $1
            RETURNING id, user_id, status, total, shipping_address_id, billing_address_id,
                      payment_confirmation_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.lines_for(&[row.id]).await?;
        let lines = lines.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_order(lines)))
    }

    /// Count orders carrying a payment confirmation id (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_payment_confirmation(
        &self,
        payment_confirmation_id: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM shop."order" WHERE payment_confirmation_id = $1"#,
        )
        .bind(payment_confirmation_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    async fn lines_for(
        &self,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<OrderLine>>, RepositoryError> {
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            r"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM shop.order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            by_order.entry(row.order_id).or_default().push(row.into());
        }
        Ok(by_order)
    }

    // =========================================================================
    // Checkout writes (transaction-scoped)
    // =========================================================================

    /// Insert an order header with status `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming
    /// [`PAYMENT_CONFIRMATION_CONSTRAINT`] if an order already exists for the
    /// payment, and `RepositoryError::ForeignKey` if the user or an address is
    /// missing.
    pub async fn insert(
        conn: &mut PgConnection,
        order: &NewOrder<'_>,
    ) -> Result<Order, RepositoryError> {
        let row: OrderRow = sqlx::query_as(
            r#"
            INSERT INTO shop."order"
                (user_id, status, total, shipping_address_id, billing_address_id,
                 payment_confirmation_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, status, total, shipping_address_id, billing_address_id,
                      payment_confirmation_id, created_at, updated_at
            "#,
        )
        .bind(order.user_id)
        .bind(OrderStatus::Pending)
        .bind(order.total)
        .bind(order.shipping_address_id)
        .bind(order.billing_address_id)
        .bind(order.payment_confirmation_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into_order(Vec::new()))
    }

    /// Insert one order line at the snapshot price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the product doesn't exist.
    pub async fn insert_line(
        conn: &mut PgConnection,
        order_id: OrderId,
        line: &SnapshotLine,
    ) -> Result<OrderLine, RepositoryError> {
        let row: OrderLineRow = sqlx::query_as(
            r"
            INSERT INTO shop.order_line (order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, product_id, quantity, unit_price
            ",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into())
    }
}
