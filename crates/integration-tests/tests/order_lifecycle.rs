//! Admin order lifecycle and the live admin check.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::StatusCode;
use sqlx::PgPool;
use tower::ServiceExt;

use mercato_api::db::UserRepository;
use mercato_api::models::Order;
use mercato_api::routes;
use mercato_api::services::checkout::CheckoutService;
use mercato_api::services::orders::{OrderError, OrderService};
use mercato_api::state::AppState;
use mercato_core::{OrderStatus, UserId};
use mercato_integration_tests::{
    checkout_request, create_product, json_body, register, request, test_state,
};

async fn place_order(state: &AppState, user_id: UserId, payment_id: &str) -> Order {
    let product = create_product(state.pool(), "Grinder", 12900).await;
    CheckoutService::new(state.pool())
        .place_order(user_id, checkout_request(&[(&product, 1)], payment_id))
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_every_status_is_reachable_from_any_other(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let order = place_order(&state, user_id, "pi_lifecycle").await;
    let orders = OrderService::new(&pool);

    for status in OrderStatus::ALL.into_iter().rev() {
        let updated = orders.set_status(order.id, status.as_str()).await.unwrap();
        assert_eq!(updated.status, status);
    }

    // Leaving a terminal-looking status is allowed.
    orders.set_status(order.id, "Cancelled").await.unwrap();
    let updated = orders.set_status(order.id, "Processing").await.unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_setting_same_status_twice_succeeds(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let order = place_order(&state, user_id, "pi_twice").await;
    let orders = OrderService::new(&pool);

    orders.set_status(order.id, "Shipped").await.unwrap();
    let updated = orders.set_status(order.id, "Shipped").await.unwrap();

    assert_eq!(updated.status, OrderStatus::Shipped);
    assert_eq!(updated.lines.len(), 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_status_leaves_order_untouched(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let order = place_order(&state, user_id, "pi_unknown").await;
    let orders = OrderService::new(&pool);

    let err = orders.set_status(order.id, "shipped").await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatus(_)));

    let err = orders.set_status(order.id, "Returned").await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatus(_)));

    assert_eq!(orders.get(order.id).await.unwrap().status, OrderStatus::Pending);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_can_ship_another_users_order(pool: PgPool) {
    let state = test_state(pool.clone());
    let admin = register(&state, "admin").await;
    let customer = register(&state, "grace").await.user.id;
    UserRepository::new(&pool)
        .set_admin(admin.user.id, true)
        .await
        .unwrap();
    let order = place_order(&state, customer, "pi_scope").await;

    let response = routes::app(state.clone())
        .oneshot(
            request("PUT", &format!("/api/admin/orders/{}/status", order.id))
                .header("authorization", format!("Bearer {}", admin.token))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"Shipped"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "Shipped");
    assert_eq!(body["user_id"], customer.as_i64());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_revoked_admin_is_forbidden_with_old_token(pool: PgPool) {
    let state = test_state(pool.clone());
    let admin = register(&state, "admin").await;
    let users = UserRepository::new(&pool);
    users.set_admin(admin.user.id, true).await.unwrap();
    let order = place_order(&state, admin.user.id, "pi_revoked").await;

    // The token was issued before the flag changed and is still valid.
    users.set_admin(admin.user.id, false).await.unwrap();

    let response = routes::app(state.clone())
        .oneshot(
            request("PUT", &format!("/api/admin/orders/{}/status", order.id))
                .header("authorization", format!("Bearer {}", admin.token))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"Shipped"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["category"], "forbidden");

    let unchanged = OrderService::new(&pool).get(order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Pending);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_customers_cannot_see_each_others_orders(pool: PgPool) {
    let state = test_state(pool.clone());
    let ada = register(&state, "ada").await;
    let grace = register(&state, "grace").await;
    let order = place_order(&state, ada.user.id, "pi_private").await;

    let response = routes::app(state.clone())
        .oneshot(
            request("GET", &format!("/api/orders/{}", order.id))
                .header("authorization", format!("Bearer {}", grace.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = routes::app(state)
        .oneshot(
            request("GET", "/api/orders")
                .header("authorization", format!("Bearer {}", ada.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}
