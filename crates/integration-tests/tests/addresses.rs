//! Shipping address resolution.

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use mercato_api::db::AddressRepository;
use mercato_api::services::addresses::AddressResolver;
use mercato_core::AddressKind;
use mercato_integration_tests::{count_rows, register, shipping_address, test_state};

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_identical_address_resolves_to_same_row(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let fields = shipping_address().validate().unwrap();
    let resolver = AddressResolver::new(&pool);

    let first = resolver.resolve_shipping(user_id, &fields).await.unwrap();
    let second = resolver.resolve_shipping(user_id, &fields).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(count_rows(&pool, "address").await, 1);

    let mut conn = pool.acquire().await.unwrap();
    let stored = AddressRepository::get(&mut conn, first).await.unwrap().unwrap();
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.kind, AddressKind::Shipping);
    assert_eq!(stored.fields, fields);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_second_line_distinguishes_addresses(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let resolver = AddressResolver::new(&pool);

    let without = shipping_address().validate().unwrap();
    let mut input = shipping_address();
    input.address_line2 = Some("Flat 3".to_string());
    let with = input.validate().unwrap();

    let a = resolver.resolve_shipping(user_id, &without).await.unwrap();
    let b = resolver.resolve_shipping(user_id, &with).await.unwrap();
    let a_again = resolver.resolve_shipping(user_id, &without).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(a, a_again);
    assert_eq!(count_rows(&pool, "address").await, 2);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_addresses_are_not_shared_between_users(pool: PgPool) {
    let state = test_state(pool.clone());
    let ada = register(&state, "ada").await.user.id;
    let grace = register(&state, "grace").await.user.id;
    let fields = shipping_address().validate().unwrap();
    let resolver = AddressResolver::new(&pool);

    let a = resolver.resolve_shipping(ada, &fields).await.unwrap();
    let g = resolver.resolve_shipping(grace, &fields).await.unwrap();

    assert_ne!(a, g);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_empty_second_line_is_not_an_absent_one(pool: PgPool) {
    let state = test_state(pool.clone());
    let user_id = register(&state, "ada").await.user.id;
    let resolver = AddressResolver::new(&pool);

    let absent = shipping_address().validate().unwrap();
    let mut input = shipping_address();
    input.address_line2 = Some("  ".to_string());
    let empty = input.validate().unwrap();

    let a = resolver.resolve_shipping(user_id, &absent).await.unwrap();
    let e = resolver.resolve_shipping(user_id, &empty).await.unwrap();
    let e_again = resolver.resolve_shipping(user_id, &empty).await.unwrap();

    assert_ne!(a, e);
    assert_eq!(e, e_again);
    assert_eq!(count_rows(&pool, "address").await, 2);
}
