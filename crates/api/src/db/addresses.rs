//! Address repository.
//!
//! Addresses are never updated or deleted. The resolver looks for an exact
//! match before inserting, so both queries take the caller's connection and
//! can run inside the checkout transaction.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use mercato_core::{AddressId, AddressKind, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressFields};

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: i64,
    user_id: i64,
    kind: AddressKind,
    full_name: String,
    line1: String,
    line2: Option<String>,
    city: String,
    postal_code: String,
    country: String,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            kind: row.kind,
            fields: AddressFields {
                full_name: row.full_name,
                line1: row.line1,
                line2: row.line2,
                city: row.city,
                postal_code: row.postal_code,
                country: row.country,
            },
            created_at: row.created_at,
        }
    }
}

/// Repository for saved addresses.
pub struct AddressRepository;

impl AddressRepository {
    /// Find an address of `kind` for `user_id` whose fields all match exactly.
    ///
    /// `line2` uses `IS NOT DISTINCT FROM`, so `NULL` matches only `NULL`.
    /// If several identical rows exist the oldest wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_matching(
        conn: &mut PgConnection,
        user_id: UserId,
        kind: AddressKind,
        fields: &AddressFields,
    ) -> Result<Option<AddressId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            SELECT id
            FROM shop.address
            WHERE user_id = $1
              AND kind = $2
              AND full_name = $3
              AND line1 = $4
              AND line2 IS NOT DISTINCT FROM $5
              AND city = $6
              AND postal_code = $7
              AND country = $8
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(user_id)
        .bind(kind)
        .bind(&fields.full_name)
        .bind(&fields.line1)
        .bind(fields.line2.as_deref())
        .bind(&fields.city)
        .bind(&fields.postal_code)
        .bind(&fields.country)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(id.map(AddressId::new))
    }

    /// Insert a new address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the user doesn't exist.
    pub async fn insert(
        conn: &mut PgConnection,
        user_id: UserId,
        kind: AddressKind,
        fields: &AddressFields,
    ) -> Result<Address, RepositoryError> {
        let row: AddressRow = sqlx::query_as(
            r"
            INSERT INTO shop.address
                (user_id, kind, full_name, line1, line2, city, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, kind, full_name, line1, line2, city, postal_code, country,
                      created_at
            ",
        )
        .bind(user_id)
        .bind(kind)
        .bind(&fields.full_name)
        .bind(&fields.line1)
        .bind(fields.line2.as_deref())
        .bind(&fields.city)
        .bind(&fields.postal_code)
        .bind(&fields.country)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Address::from(row))
    }

    /// Get an address by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        conn: &mut PgConnection,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(
            r"
            SELECT id, user_id, kind, full_name, line1, line2, city, postal_code, country,
                   created_at
            FROM shop.address
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Address::from))
    }
}
