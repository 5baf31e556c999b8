//! Catalog product type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercato_core::{Money, ProductId};

/// A catalog product with its current price.
///
/// Order lines copy the price at checkout, so changing it here never
/// touches existing orders.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
