//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`], which checks the live admin flag.

use axum::{Json, extract::State};
use serde::Deserialize;

use mercato_core::{OrderId, UserId};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAdmin;
use crate::models::{Order, User};
use crate::services::auth::AuthService;
use crate::services::orders::OrderService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// One of `Pending`, `Processing`, `Shipped`, `Delivered`, `Cancelled`,
    /// `Refunded`.
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

/// GET /api/admin/orders/{id}
///
/// # Errors
///
/// `not_found` if the order doesn't exist.
pub async fn show_order(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(state.pool()).get(id).await?))
}

/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// `validation` for an unknown status; `not_found` if the order doesn't exist.
pub async fn set_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<SetStatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .set_status(id, &body.status)
        .await?;
    tracing::info!(admin_id = %admin.id, order_id = %id, status = %order.status, "Admin set order status");
    Ok(Json(order))
}

/// PUT /api/admin/users/{id}/admin
///
/// # Errors
///
/// `forbidden` when targeting yourself; `not_found` for an unknown user.
pub async fn set_user_admin(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(body): ApiJson<SetAdminRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool(), state.tokens())
        .set_admin(admin.id, id, body.is_admin)
        .await?;
    Ok(Json(user))
}
