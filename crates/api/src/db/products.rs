//! Product catalog repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use mercato_core::{Money, ProductId};

use super::RepositoryError;
use crate::models::product::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Money,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewProduct<'p> {
    pub name: &'p str,
    pub description: Option<&'p str>,
    pub price: Money,
    pub image_url: Option<&'p str>,
}

/// Repository for catalog reads and operator writes.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the catalog, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, description, price, image_url, created_at, updated_at
            FROM shop.product
            ORDER BY name, id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, description, price, image_url, created_at, updated_at
            FROM shop.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, product: &NewProduct<'_>) -> Result<Product, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, product).await
    }

    /// Add a product on the given connection, typically inside a
    /// caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::OutOfRange` if the price does not fit the
    /// column, or `RepositoryError::Database` if the insert fails otherwise.
    pub async fn insert(
        conn: &mut PgConnection,
        product: &NewProduct<'_>,
    ) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(
            r"
            INSERT INTO shop.product (name, description, price, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price, image_url, created_at, updated_at
            ",
        )
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.image_url)
        .fetch_one(conn)
        .await?;

        Ok(Product::from(row))
    }

    /// Change a product's current price. Existing order lines keep theirs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update_price(&self, id: ProductId, price: Money) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            UPDATE shop.product
            SET price = $2
            WHERE id = $1
            RETURNING id, name, description, price, image_url, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(price)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }
}
