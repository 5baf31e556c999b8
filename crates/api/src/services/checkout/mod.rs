//! Order placement.
//!
//! Turns a confirmed payment plus the client's cart snapshot into an order.
//! Input is validated completely before a connection is taken. The address
//! lookup, order insert, line inserts and cart wipe then share one
//! transaction: if any step fails the transaction is dropped, which rolls it
//! back, so no partial order is ever visible and the cart is left alone.
//!
//! A retried request for a payment that already produced an order fails on
//! the unique payment confirmation id and surfaces as
//! [`CheckoutError::DuplicatePayment`].

mod error;

pub use error::CheckoutError;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use mercato_core::{Money, ProductId, UserId};

use crate::db::orders::NewOrder;
use crate::db::{CartRepository, OrderRepository};
use crate::models::address::{AddressFields, AddressInput};
use crate::models::order::{Order, SnapshotLine};
use crate::services::addresses::AddressResolver;

/// Longest accepted payment confirmation id.
const MAX_PAYMENT_ID_LENGTH: usize = 255;

/// Most lines accepted in one snapshot.
const MAX_LINES: usize = 500;

// =============================================================================
// Request Types
// =============================================================================

/// Checkout payload as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping_address: AddressInput,
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    pub declared_total: Option<Decimal>,
    pub payment_confirmation_id: Option<String>,
    /// `succeeded` (default) or `processing`.
    pub payment_status: Option<String>,
}

/// One cart snapshot entry as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i32>,
    /// Price the customer saw and paid; recorded verbatim on the order line.
    pub price: Option<Decimal>,
}

/// What the payment processor reported for the charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Succeeded,
    Processing,
}

impl std::str::FromStr for PaymentStatus {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "succeeded" => Ok(Self::Succeeded),
            "processing" => Ok(Self::Processing),
            other => Err(CheckoutError::Validation(format!(
                "payment_status must be 'succeeded' or 'processing', got {other:?}"
            ))),
        }
    }
}

/// A checkout request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub shipping: AddressFields,
    pub lines: Vec<SnapshotLine>,
    pub declared_total: Money,
    pub payment_confirmation_id: String,
    pub payment_status: PaymentStatus,
}

impl CheckoutRequest {
    /// Check every precondition of order placement.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` naming the first offending field.
    pub fn validate(self) -> Result<ValidatedCheckout, CheckoutError> {
        let shipping = self
            .shipping_address
            .validate()
            .map_err(|e| CheckoutError::Validation(format!("shipping_address: {e}")))?;

        if self.items.is_empty() {
            return Err(CheckoutError::Validation("cart is empty".to_owned()));
        }
        if self.items.len() > MAX_LINES {
            return Err(CheckoutError::Validation(format!(
                "at most {MAX_LINES} items may be ordered at once"
            )));
        }
        let lines = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let declared_total = self
            .declared_total
            .ok_or_else(|| CheckoutError::Validation("declared_total is required".to_owned()))
            .and_then(|amount| {
                Money::new(amount)
                    .map_err(|e| CheckoutError::Validation(format!("declared_total: {e}")))
            })?;

        let payment_confirmation_id = self
            .payment_confirmation_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CheckoutError::Validation("payment_confirmation_id is required".to_owned())
            })?;
        if payment_confirmation_id.len() > MAX_PAYMENT_ID_LENGTH {
            return Err(CheckoutError::Validation(format!(
                "payment_confirmation_id must be at most {MAX_PAYMENT_ID_LENGTH} characters"
            )));
        }

        let payment_status = self
            .payment_status
            .as_deref()
            .map_or(Ok(PaymentStatus::Succeeded), str::parse)?;

        Ok(ValidatedCheckout {
            shipping,
            lines,
            declared_total,
            payment_confirmation_id,
            payment_status,
        })
    }
}

impl CheckoutItem {
    fn validate(self, index: usize) -> Result<SnapshotLine, CheckoutError> {
        let field = |name: &str| format!("items[{index}].{name}");

        let product_id = self
            .product_id
            .ok_or_else(|| CheckoutError::Validation(format!("{} is required", field("product_id"))))?;
        let quantity = self
            .quantity
            .ok_or_else(|| CheckoutError::Validation(format!("{} is required", field("quantity"))))?;
        if quantity < 1 {
            return Err(CheckoutError::Validation(format!(
                "{} must be at least 1",
                field("quantity")
            )));
        }
        let unit_price = self
            .price
            .ok_or_else(|| CheckoutError::Validation(format!("{} is required", field("price"))))
            .and_then(|price| {
                Money::new(price)
                    .map_err(|e| CheckoutError::Validation(format!("{}: {e}", field("price"))))
            })?;

        Ok(SnapshotLine {
            product_id,
            quantity,
            unit_price,
        })
    }
}

/// Σ(price × quantity) over the snapshot.
///
/// # Errors
///
/// Returns `CheckoutError::Validation` if the total overflows.
pub fn snapshot_total(lines: &[SnapshotLine]) -> Result<Money, CheckoutError> {
    lines.iter().try_fold(Money::ZERO, |total, line| {
        line.line_total()
            .and_then(|line_total| total.checked_add(line_total))
            .map_err(|e| CheckoutError::Validation(format!("order total: {e}")))
    })
}

// =============================================================================
// Service
// =============================================================================

/// Order ledger: the only writer of orders and order lines.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order from a confirmed payment.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for bad input (nothing written).
    /// Returns `CheckoutError::DuplicatePayment` if an order already exists
    /// for the payment, `CheckoutError::Referential` if a product vanished,
    /// and `CheckoutError::Repository` for other failures; all three roll
    /// the transaction back.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let checkout = request.validate()?;

        let computed_total = snapshot_total(&checkout.lines)?;
        if computed_total != checkout.declared_total {
            tracing::warn!(
                user_id = %user_id,
                declared_total = %checkout.declared_total,
                computed_total = %computed_total,
                "Declared total differs from snapshot total; recording the declared (charged) amount"
            );
        }
        if checkout.payment_status == PaymentStatus::Processing {
            tracing::info!(
                user_id = %user_id,
                payment_confirmation_id = %checkout.payment_confirmation_id,
                "Placing order for a payment that is still processing"
            );
        }

        self.record(user_id, &checkout).await
    }

    async fn record(
        &self,
        user_id: UserId,
        checkout: &ValidatedCheckout,
    ) -> Result<Order, CheckoutError> {
        let payment_id = checkout.payment_confirmation_id.as_str();
        let mut tx = self.pool.begin().await?;

        let address_id =
            AddressResolver::resolve_shipping_in(&mut tx, user_id, &checkout.shipping).await?;

        let mut order = OrderRepository::insert(
            &mut tx,
            &NewOrder {
                user_id,
                total: checkout.declared_total,
                shipping_address_id: address_id,
                billing_address_id: address_id,
                payment_confirmation_id: payment_id,
            },
        )
        .await
        .map_err(|e| CheckoutError::from_repository(e, payment_id))?;

        for line in &checkout.lines {
            let line = OrderRepository::insert_line(&mut tx, order.id, line)
                .await
                .map_err(|e| CheckoutError::from_repository(e, payment_id))?;
            order.lines.push(line);
        }

        let cleared = CartRepository::clear_in(&mut tx, user_id).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            line_count = order.lines.len(),
            cart_lines_cleared = cleared,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_request() -> CheckoutRequest {
        serde_json::from_value(serde_json::json!({
            "shipping_address": {
                "full_name": "Ada Lovelace",
                "address_line1": "12 St James's Square",
                "city": "London",
                "postal_code": "SW1Y 4JH",
                "country": "GB"
            },
            "items": [
                { "product_id": 1, "quantity": 2, "price": "10.00" },
                { "product_id": 2, "quantity": 1, "price": "4.50" }
            ],
            "declared_total": "24.50",
            "payment_confirmation_id": "pi_3Nq8XYZ"
        }))
        .unwrap()
    }

    fn validation_message(request: CheckoutRequest) -> String {
        match request.validate() {
            Err(CheckoutError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request() {
        let checkout = valid_request().validate().unwrap();
        assert_eq!(checkout.lines.len(), 2);
        assert_eq!(checkout.declared_total.to_string(), "24.50");
        assert_eq!(checkout.payment_status, PaymentStatus::Succeeded);
        assert_eq!(checkout.shipping.line2, None);
        assert_eq!(
            snapshot_total(&checkout.lines).unwrap(),
            checkout.declared_total
        );
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let mut request = valid_request();
        request.items.clear();
        assert_eq!(validation_message(request), "cart is empty");
    }

    #[test]
    fn test_missing_payment_confirmation_is_rejected() {
        let mut request = valid_request();
        request.payment_confirmation_id = Some("   ".to_owned());
        assert_eq!(
            validation_message(request),
            "payment_confirmation_id is required"
        );
    }

    #[test]
    fn test_negative_declared_total_is_rejected() {
        let mut request = valid_request();
        request.declared_total = Some(Decimal::new(-100, 2));
        assert!(validation_message(request).starts_with("declared_total"));
    }

    #[test]
    fn test_amounts_beyond_storage_are_rejected() {
        let mut request = valid_request();
        request.declared_total = Some(Decimal::new(1_000_000_000_000, 2));
        assert!(validation_message(request).starts_with("declared_total: amount cannot exceed"));

        let mut request = valid_request();
        request.items[0].price = Some(Decimal::new(600_000_000_000, 2));
        request.items[0].quantity = Some(2);
        let checkout = request.validate().unwrap();
        assert!(matches!(
            snapshot_total(&checkout.lines),
            Err(CheckoutError::Validation(m)) if m.starts_with("order total")
        ));
    }

    #[test]
    fn test_bad_line_is_reported_by_index() {
        let mut request = valid_request();
        request.items[1].quantity = Some(0);
        assert_eq!(
            validation_message(request),
            "items[1].quantity must be at least 1"
        );

        let mut request = valid_request();
        request.items[0].price = Some(Decimal::new(1, 3));
        assert!(validation_message(request).starts_with("items[0].price"));
    }

    #[test]
    fn test_incomplete_address_is_rejected() {
        let mut request = valid_request();
        request.shipping_address.postal_code = None;
        assert_eq!(
            validation_message(request),
            "shipping_address: postal_code is required"
        );
    }

    #[test]
    fn test_payment_status_values() {
        let mut request = valid_request();
        request.payment_status = Some("processing".to_owned());
        assert_eq!(
            request.validate().unwrap().payment_status,
            PaymentStatus::Processing
        );

        let mut request = valid_request();
        request.payment_status = Some("failed".to_owned());
        assert!(validation_message(request).starts_with("payment_status"));
    }

    #[test]
    fn test_duplicate_payment_is_classified() {
        let err = CheckoutError::from_repository(
            crate::db::RepositoryError::Conflict(
                crate::db::orders::PAYMENT_CONFIRMATION_CONSTRAINT.to_owned(),
            ),
            "pi_1",
        );
        assert!(matches!(err, CheckoutError::DuplicatePayment(id) if id == "pi_1"));

        let err = CheckoutError::from_repository(
            crate::db::RepositoryError::ForeignKey("order_line_product_id_fkey".to_owned()),
            "pi_1",
        );
        assert!(matches!(err, CheckoutError::Referential(_)));
    }
}
