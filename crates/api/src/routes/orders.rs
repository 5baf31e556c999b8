//! Order route handlers for customers.

use axum::{Json, extract::State, http::StatusCode};

use mercato_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Place an order from a confirmed payment.
///
/// POST /api/orders
///
/// # Errors
///
/// `validation` for bad input, `conflict` if the payment already produced an
/// order, `referential` if a product no longer exists.
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = CheckoutService::new(state.pool())
        .place_order(user.id, body)
        .await?;

    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders
///
/// # Errors
///
/// Returns `AppError::Database` if the read fails.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderService::new(state.pool()).list_for_user(user.id).await?,
    ))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// `not_found` if the order doesn't exist or belongs to another user.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderService::new(state.pool())
            .get_for_user(user.id, id)
            .await?,
    ))
}
