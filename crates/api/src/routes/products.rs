//! Catalog route handlers (read-only).

use axum::{Json, extract::State};

use mercato_core::ProductId;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::extract::ApiPath;
use crate::models::Product;
use crate::state::AppState;

/// GET /api/products
///
/// # Errors
///
/// Returns `AppError::Database` if the read fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(ProductRepository::new(state.pool()).list().await?))
}

/// GET /api/products/{id}
///
/// # Errors
///
/// `not_found` if the product doesn't exist.
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))
}
