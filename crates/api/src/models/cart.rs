//! Cart read model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercato_core::{Money, ProductId};

/// One product in a user's cart, joined with its current catalog data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    /// Current catalog price, not a frozen one.
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
    pub added_at: DateTime<Utc>,
}

/// A user's cart.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    /// Sum of quantities across lines.
    pub item_count: i64,
    pub total: Money,
}

impl Cart {
    /// Build a cart from its lines, computing the totals.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let total = lines.iter().map(|l| l.line_total).sum();
        Self {
            lines,
            item_count,
            total,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(product: i64, cents: i64, quantity: i32) -> CartLine {
        let unit_price = Money::new(Decimal::new(cents, 2)).unwrap();
        CartLine {
            product_id: ProductId::new(product),
            name: format!("Product {product}"),
            image_url: None,
            unit_price,
            quantity,
            line_total: unit_price.times(quantity).unwrap(),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_lines_totals() {
        let cart = Cart::from_lines(vec![line(1, 1000, 2), line(2, 550, 1)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.total.to_string(), "25.50");
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(Vec::new());
        assert!(cart.is_empty());
        assert_eq!(cart.total, Money::ZERO);
    }
}
