//! Order lifecycle.
//!
//! Reads for customers and admins, plus the admin status update. Any of the
//! six statuses may replace any other; an unknown name is rejected before
//! the database is touched.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use mercato_core::{OrderId, OrderStatus, UnknownOrderStatus, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::order::Order;

/// Errors that can occur when reading or updating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    InvalidStatus(#[from] UnknownOrderStatus),

    #[error("order not found")]
    NotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Order service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// Set an order's status by its wire name (`"Shipped"`, ...).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidStatus` if `status` is not one of the six
    /// names (matched exactly) and `OrderError::NotFound` if the order
    /// doesn't exist.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn set_status(&self, order_id: OrderId, status: &str) -> Result<Order, OrderError> {
        let status: OrderStatus = status.parse()?;

        let order = self
            .orders
            .update_status(order_id, status)
            .await?
            .ok_or(OrderError::NotFound)?;

        tracing::info!(status = %order.status, "Order status updated");
        Ok(order)
    }

    /// Get any order (admin view).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist.
    pub async fn get(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Get one of the user's own orders.
    ///
    /// Another user's order is reported as missing rather than forbidden so
    /// order ids can't be probed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist or belongs
    /// to someone else.
    pub async fn get_for_user(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.get(order_id).await?;
        if order.user_id != user_id {
            return Err(OrderError::NotFound);
        }
        Ok(order)
    }

    /// List the user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the read fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }
}
