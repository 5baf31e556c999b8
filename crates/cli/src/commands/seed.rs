//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Espresso Beans
//!     description: Dark roast, 1kg
//!     price: "24.90"
//!     image_url: https://cdn.example.com/beans.jpg
//!   - name: Filter Papers
//!     price: "3.50"
//! ```
//!
//! The whole file is validated before anything is inserted, and the inserts
//! share one transaction: either every product lands or none does.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use mercato_api::db::products::NewProduct;
use mercato_api::db::{ProductRepository, RepositoryError};
use mercato_api::models::Product;
use mercato_core::Money;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("products[{index}]: {message}")]
    InvalidProduct { index: usize, message: String },

    #[error(transparent)]
    Connection(#[from] super::ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
struct ProductEntry {
    name: String,
    description: Option<String>,
    price: Decimal,
    image_url: Option<String>,
}

/// A catalog entry that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidProduct {
    name: String,
    description: Option<String>,
    price: Money,
    image_url: Option<String>,
}

/// Insert every product in the file.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable or invalid, or an insert fails.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.to_owned(),
            source,
        })?;

    let products = parse(&content)?;
    info!(path = %file_path, count = products.len(), "Catalog file validated");

    let pool = super::connect().await?;
    let inserted = insert_all(&pool, &products).await?;

    info!("Seeding complete! {} products inserted", inserted.len());
    Ok(())
}

async fn insert_all(pool: &PgPool, products: &[ValidProduct]) -> Result<Vec<Product>, SeedError> {
    let mut tx = pool.begin().await.map_err(RepositoryError::from)?;
    let mut inserted = Vec::with_capacity(products.len());

    for product in products {
        let created = ProductRepository::insert(
            &mut tx,
            &NewProduct {
                name: &product.name,
                description: product.description.as_deref(),
                price: product.price,
                image_url: product.image_url.as_deref(),
            },
        )
        .await?;
        info!(product_id = %created.id, name = %created.name, price = %created.price, "Product inserted");
        inserted.push(created);
    }

    tx.commit().await.map_err(RepositoryError::from)?;
    Ok(inserted)
}

fn parse(content: &str) -> Result<Vec<ValidProduct>, SeedError> {
    let file: CatalogFile = serde_yaml::from_str(content)?;

    file.products
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let invalid = |message: String| SeedError::InvalidProduct { index, message };

            let name = entry.name.trim().to_owned();
            if name.is_empty() {
                return Err(invalid("name cannot be empty".to_owned()));
            }
            let price = Money::new(entry.price).map_err(|e| invalid(format!("price: {e}")))?;

            Ok(ValidProduct {
                name,
                description: entry.description.filter(|d| !d.trim().is_empty()),
                price,
                image_url: entry.image_url.filter(|u| !u.trim().is_empty()),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let products = parse(
            r#"
products:
  - name: Espresso Beans
    description: Dark roast, 1kg
    price: "24.90"
  - name: "  Filter Papers "
    price: "3.5"
    image_url: ""
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price.to_string(), "24.90");
        assert_eq!(products[1].name, "Filter Papers");
        assert_eq!(products[1].price.to_string(), "3.50");
        assert_eq!(products[1].image_url, None);
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        let err = parse(
            r#"
products:
  - name: Ok
    price: "1.00"
  - name: Negative
    price: "-2.00"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, SeedError::InvalidProduct { index: 1, .. }));

        let err = parse("products:\n  - name: \"\"\n    price: \"1.00\"\n").unwrap_err();
        assert!(matches!(err, SeedError::InvalidProduct { index: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_price_above_column_range() {
        let err = parse("products:\n  - name: Yacht\n    price: \"10000000000.00\"\n").unwrap_err();
        let SeedError::InvalidProduct { index, message } = err else {
            panic!("expected an invalid product");
        };
        assert_eq!(index, 0);
        assert_eq!(message, "price: amount cannot exceed 9999999999.99");
    }

    fn valid(name: &str, cents: i64) -> ValidProduct {
        ValidProduct {
            name: name.to_owned(),
            description: None,
            price: Money::new(Decimal::new(cents, 2)).unwrap(),
            image_url: None,
        }
    }

    async fn product_count(pool: &PgPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM shop.product")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "../api/migrations")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_insert_all_commits_every_product(pool: PgPool) {
        let products = [valid("Espresso Beans", 2490), valid("Filter Papers", 350)];
        let inserted = insert_all(&pool, &products).await.unwrap();

        assert_eq!(inserted.len(), 2);
        assert_eq!(product_count(&pool).await, 2);
    }

    #[sqlx::test(migrations = "../api/migrations")]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_failed_insert_leaves_catalog_untouched(pool: PgPool) {
        // The blank name fails the table's CHECK after the first row went in.
        let products = [valid("Espresso Beans", 2490), valid("   ", 350)];
        let err = insert_all(&pool, &products).await.unwrap_err();

        assert!(matches!(err, SeedError::Repository(_)));
        assert_eq!(product_count(&pool).await, 0);
    }
}
