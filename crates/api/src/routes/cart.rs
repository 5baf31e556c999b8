//! Cart route handlers.
//!
//! Every mutation answers with the whole cart at current catalog prices.

use axum::{Json, extract::State};
use serde::Deserialize;

use mercato_core::ProductId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::services::cart::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// GET /api/cart
///
/// # Errors
///
/// Returns `AppError::Database` if the read fails.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    Ok(Json(CartService::new(state.pool()).read(user.id).await?))
}

/// POST /api/cart/items
///
/// # Errors
///
/// `validation` for a quantity outside 1..=999; `not_found` for an unknown
/// product.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<Cart>> {
    let cart = CartService::new(state.pool())
        .add(user.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// PUT /api/cart/items/{product_id}
///
/// A quantity of zero or less removes the line.
///
/// # Errors
///
/// `validation` for a quantity above 999; `not_found` for an unknown product.
pub async fn set_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<SetQuantityRequest>,
) -> Result<Json<Cart>> {
    let cart = CartService::new(state.pool())
        .set_quantity(user.id, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/cart/items/{product_id}
///
/// # Errors
///
/// Returns `AppError::Database` if the delete fails.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Cart>> {
    let cart = CartService::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/cart
///
/// # Errors
///
/// Returns `AppError::Database` if the delete fails.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    Ok(Json(CartService::new(state.pool()).clear(user.id).await?))
}
