//! Cart line arithmetic against a real database.

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use mercato_api::services::cart::{CartError, CartService};
use mercato_core::ProductId;
use mercato_integration_tests::{create_product, money, register, test_state};

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_adding_twice_sums_quantities(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let cart = CartService::new(&pool);

    cart.add(user_id, beans.id, 2).await.unwrap();
    let current = cart.add(user_id, beans.id, 3).await.unwrap();

    assert_eq!(current.lines.len(), 1);
    assert_eq!(current.lines[0].quantity, 5);
    assert_eq!(current.item_count, 5);
    assert_eq!(current.total, money(12450));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_setting_zero_removes_line(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let papers = create_product(&pool, "Filter Papers", 350).await;
    let cart = CartService::new(&pool);

    cart.add(user_id, beans.id, 2).await.unwrap();
    cart.add(user_id, papers.id, 1).await.unwrap();

    let current = cart.set_quantity(user_id, beans.id, 0).await.unwrap();
    assert_eq!(current.lines.len(), 1);
    assert_eq!(current.lines[0].product_id, papers.id);

    let current = cart.set_quantity(user_id, papers.id, 4).await.unwrap();
    assert_eq!(current.lines[0].quantity, 4);
    assert_eq!(current.total, money(1400));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_product_is_not_found(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let missing = ProductId::new(9_999);

    let err = CartService::new(&pool)
        .add(user_id, missing, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::ProductNotFound(id) if id == missing));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_carts_are_per_user(pool: PgPool) {
    let state = test_state(pool.clone());
    let ada = register(&state, "ada").await.user.id;
    let grace = register(&state, "grace").await.user.id;
    let beans = create_product(&pool, "Espresso Beans", 2490).await;
    let cart = CartService::new(&pool);

    cart.add(ada, beans.id, 1).await.unwrap();
    cart.clear(grace).await.unwrap();

    assert_eq!(cart.read(ada).await.unwrap().item_count, 1);
    assert!(cart.read(grace).await.unwrap().is_empty());
}
