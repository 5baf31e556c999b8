//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercato_core::{AddressId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// A placed order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// The declared (charged) total from checkout. It can differ from the sum
    /// of the line totals; a mismatch is logged, not corrected.
    pub total: Money,
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    pub payment_confirmation_id: String,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order. `unit_price` never changes after checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
}

/// One entry of the cart snapshot a client submits at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
}

impl SnapshotLine {
    /// `unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the product overflows.
    pub fn line_total(&self) -> Result<Money, mercato_core::MoneyError> {
        self.unit_price.times(self.quantity)
    }
}
