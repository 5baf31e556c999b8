//! Order placement against a real database.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use mercato_api::db::{OrderRepository, ProductRepository, RepositoryError};
use mercato_api::services::cart::CartService;
use mercato_api::services::checkout::{CheckoutError, CheckoutService};
use mercato_core::{OrderStatus, ProductId};
use mercato_integration_tests::{
    checkout_request, count_rows, create_product, money, register, test_state,
};

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_records_every_line_and_empties_cart(pool: PgPool) {
    let state = test_state(pool.clone());
    let session = register(&state, "ada").await;
    let user_id = session.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let papers = create_product(&pool, "Filter Papers", 350).await;

    let cart = CartService::new(&pool);
    cart.add(user_id, beans.id, 2).await.unwrap();
    cart.add(user_id, papers.id, 1).await.unwrap();

    let order = CheckoutService::new(&pool)
        .place_order(
            user_id,
            checkout_request(&[(&beans, 2), (&papers, 1)], "pi_order_lines"),
        )
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, money(5330));
    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.shipping_address_id, order.billing_address_id);
    assert_eq!(count_rows(&pool, "order_line").await, 2);
    assert!(cart.read(user_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_payment_is_rejected_without_side_effects(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let checkout = CheckoutService::new(&pool);

    checkout
        .place_order(user_id, checkout_request(&[(&beans, 1)], "pi_dup"))
        .await
        .unwrap();

    // Refill the cart so a rolled-back clear would be visible.
    let cart = CartService::new(&pool);
    cart.add(user_id, beans.id, 3).await.unwrap();

    let err = checkout
        .place_order(user_id, checkout_request(&[(&beans, 3)], "pi_dup"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::DuplicatePayment(ref id) if id == "pi_dup"));
    assert_eq!(
        OrderRepository::new(&pool)
            .count_by_payment_confirmation("pi_dup")
            .await
            .unwrap(),
        1
    );
    assert_eq!(count_rows(&pool, "order").await, 1);
    assert_eq!(count_rows(&pool, "order_line").await, 1);
    assert_eq!(count_rows(&pool, "address").await, 1);
    assert_eq!(cart.read(user_id).await.unwrap().item_count, 3);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_line_prices_do_not_follow_catalog(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;

    let order = CheckoutService::new(&pool)
        .place_order(user_id, checkout_request(&[(&beans, 2)], "pi_frozen"))
        .await
        .unwrap();

    ProductRepository::new(&pool)
        .update_price(beans.id, money(2990))
        .await
        .unwrap();

    let stored = mercato_api::services::orders::OrderService::new(&pool)
        .get(order.id)
        .await
        .unwrap();
    assert_eq!(stored.lines[0].unit_price, money(2490));
    assert_eq!(stored.total, money(4980));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_declared_total_is_recorded_when_it_differs(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 1000).await;

    let mut request = checkout_request(&[(&beans, 2)], "pi_mismatch");
    request.declared_total = Some(Decimal::new(1800, 2));

    let order = CheckoutService::new(&pool)
        .place_order(user_id, request)
        .await
        .unwrap();

    assert_eq!(order.total, money(1800));
    assert_eq!(order.lines[0].unit_price, money(1000));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_second_order_reuses_shipping_address(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let checkout = CheckoutService::new(&pool);

    let first = checkout
        .place_order(user_id, checkout_request(&[(&beans, 1)], "pi_first"))
        .await
        .unwrap();
    let second = checkout
        .place_order(user_id, checkout_request(&[(&beans, 1)], "pi_second"))
        .await
        .unwrap();

    assert_eq!(first.shipping_address_id, second.shipping_address_id);
    assert_eq!(count_rows(&pool, "address").await, 1);
    assert_eq!(count_rows(&pool, "order").await, 2);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_missing_product_rolls_back_everything(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;

    let cart = CartService::new(&pool);
    cart.add(user_id, beans.id, 1).await.unwrap();

    let mut request = checkout_request(&[(&beans, 1)], "pi_missing");
    request.items[0].product_id = Some(ProductId::new(beans.id.as_i64() + 1000));

    let err = CheckoutService::new(&pool)
        .place_order(user_id, request)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Referential(_)));
    assert_eq!(count_rows(&pool, "order").await, 0);
    assert_eq!(count_rows(&pool, "order_line").await, 0);
    assert_eq!(count_rows(&pool, "address").await, 0);
    assert_eq!(cart.read(user_id).await.unwrap().item_count, 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_invalid_request_writes_nothing(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;

    let mut request = checkout_request(&[(&beans, 1)], "pi_invalid");
    request.shipping_address.city = None;

    let err = CheckoutService::new(&pool)
        .place_order(user_id, request)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(_)));
    assert_eq!(count_rows(&pool, "order").await, 0);
    assert_eq!(count_rows(&pool, "address").await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_empty_cart_is_rejected(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;

    let err = CheckoutService::new(&pool)
        .place_order(user_id, checkout_request(&[], "pi_empty"))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(ref m) if m == "cart is empty"));
    assert_eq!(count_rows(&pool, "order").await, 0);
    assert_eq!(count_rows(&pool, "order_line").await, 0);
    assert_eq!(count_rows(&pool, "address").await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_to_order(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let product = create_product(&pool, "Tamper", 1000).await;
    let cart = CartService::new(&pool);

    let current = cart.add(user_id, product.id, 2).await.unwrap();
    assert_eq!(current.total, money(2000));

    let order = CheckoutService::new(&pool)
        .place_order(user_id, checkout_request(&[(&product, 2)], "pi_fresh"))
        .await
        .unwrap();

    assert_eq!(order.total, money(2000));
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].product_id, product.id);
    assert_eq!(order.lines[0].quantity, 2);
    assert_eq!(order.lines[0].unit_price, money(1000));
    assert_eq!(count_rows(&pool, "order").await, 1);
    assert!(cart.read(user_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_amount_wider_than_column_is_out_of_range(pool: PgPool) {
    let beans = create_product(&pool, "Espresso Beans", 2490).await;

    let err = sqlx::query("UPDATE shop.product SET price = $2 WHERE id = $1")
        .bind(beans.id)
        .bind(Decimal::new(100_000_000_000, 0))
        .execute(&pool)
        .await
        .map_err(RepositoryError::from)
        .unwrap_err();

    assert!(matches!(err, RepositoryError::OutOfRange));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_submissions_of_one_payment_record_one_order(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let checkout = CheckoutService::new(&pool);

    let (first, second) = tokio::join!(
        checkout.place_order(user_id, checkout_request(&[(&beans, 1)], "pi_race")),
        checkout.place_order(user_id, checkout_request(&[(&beans, 1)], "pi_race")),
    );

    let (placed, rejected): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
    assert_eq!(placed.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        rejected.into_iter().next().unwrap(),
        Err(CheckoutError::DuplicatePayment(ref id)) if id == "pi_race"
    ));
    assert_eq!(count_rows(&pool, "order").await, 1);
    assert_eq!(count_rows(&pool, "order_line").await, 1);
}
