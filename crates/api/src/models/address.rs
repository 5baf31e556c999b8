//! Address domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{AddressId, AddressKind, UserId};

/// Longest value accepted for any single address field.
const MAX_FIELD_LENGTH: usize = 200;

/// Errors raised while validating address input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Address fields as submitted by a client. Every field is optional here so
/// that a missing field is reported by name instead of as a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressInput {
    pub full_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl AddressInput {
    /// Trim and validate every field.
    ///
    /// `address_line2` is only trimmed: an empty second line is kept as
    /// `Some("")` and is a different address from one without a second line.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] naming the first missing or oversized field.
    pub fn validate(self) -> Result<AddressFields, AddressError> {
        Ok(AddressFields {
            full_name: required("full_name", self.full_name)?,
            line1: required("address_line1", self.address_line1)?,
            line2: optional("address_line2", self.address_line2)?,
            city: required("city", self.city)?,
            postal_code: required("postal_code", self.postal_code)?,
            country: required("country", self.country)?,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, AddressError> {
    optional(field, value)?
        .filter(|v| !v.is_empty())
        .ok_or(AddressError::Missing(field))
}

fn optional(field: &'static str, value: Option<String>) -> Result<Option<String>, AddressError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_FIELD_LENGTH {
        return Err(AddressError::TooLong {
            field,
            max: MAX_FIELD_LENGTH,
        });
    }
    Ok(Some(trimmed.to_owned()))
}

/// Validated address fields, the unit of exact-match deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressFields {
    pub full_name: String,
    #[serde(rename = "address_line1")]
    pub line1: String,
    #[serde(rename = "address_line2")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// A stored address (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub kind: AddressKind,
    #[serde(flatten)]
    pub fields: AddressFields,
    pub created_at: DateTime<Utc>,
}
