//! Cart service.
//!
//! Thin rules over [`CartRepository`]: quantities are validated here, a
//! missing product surfaces as [`CartError::ProductNotFound`], and every
//! mutation answers with the updated cart.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use mercato_core::{ProductId, UserId};

use crate::db::{CartRepository, RepositoryError};
use crate::models::cart::Cart;

/// Largest quantity accepted in a single cart request.
pub const MAX_QUANTITY_PER_REQUEST: i32 = 999;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    InvalidQuantity(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
        }
    }

    /// Read the cart with current prices and a computed total.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the read fails.
    pub async fn read(&self, user_id: UserId) -> Result<Cart, CartError> {
        Ok(Cart::from_lines(self.carts.lines(user_id).await?))
    }

    /// Add `quantity` of a product, summing with any existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` unless `1 <= quantity <= 999`.
    /// Returns `CartError::ProductNotFound` if the product doesn't exist.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        if !(1..=MAX_QUANTITY_PER_REQUEST).contains(&quantity) {
            return Err(CartError::InvalidQuantity(format!(
                "quantity must be between 1 and {MAX_QUANTITY_PER_REQUEST}"
            )));
        }

        self.carts
            .add(user_id, product_id, quantity)
            .await
            .map_err(|e| not_found_on_foreign_key(e, product_id))?;

        self.read(user_id).await
    }

    /// Overwrite a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity > 999`.
    /// Returns `CartError::ProductNotFound` if the product doesn't exist.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        if quantity > MAX_QUANTITY_PER_REQUEST {
            return Err(CartError::InvalidQuantity(format!(
                "quantity must be at most {MAX_QUANTITY_PER_REQUEST}"
            )));
        }

        if quantity <= 0 {
            self.carts.remove(user_id, product_id).await?;
        } else {
            self.carts
                .set_quantity(user_id, product_id, quantity)
                .await
                .map_err(|e| not_found_on_foreign_key(e, product_id))?;
        }

        self.read(user_id).await
    }

    /// Remove a line. Removing a product that isn't in the cart is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<Cart, CartError> {
        self.carts.remove(user_id, product_id).await?;
        self.read(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, CartError> {
        let removed = self.carts.clear(user_id).await?;
        tracing::debug!(user_id = %user_id, removed, "Cart cleared");
        Ok(Cart::from_lines(Vec::new()))
    }
}

fn not_found_on_foreign_key(e: RepositoryError, product_id: ProductId) -> CartError {
    match e {
        RepositoryError::ForeignKey(_) => CartError::ProductNotFound(product_id),
        other => CartError::Repository(other),
    }
}
