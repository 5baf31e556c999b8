//! Non-negative monetary amounts using decimal arithmetic.
//!
//! The store trades in a single currency, so a `Money` is just an amount with
//! at most two fractional digits. Amounts are serialized as strings
//! (`"19.99"`) so no precision is lost in JSON.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Money`] value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount has more than two fractional digits.
    #[error("amount cannot have more than {max} decimal places")]
    TooPrecise {
        /// Maximum allowed fractional digits.
        max: u32,
    },
    /// The amount is larger than [`Money::MAX`].
    #[error("amount cannot exceed {}", Money::MAX)]
    TooLarge,
    /// Arithmetic left the representable range.
    #[error("amount overflowed")]
    Overflow,
}

/// A non-negative amount with at most two decimal places.
///
/// ```
/// use mercato_core::Money;
/// use rust_decimal::Decimal;
///
/// let unit = Money::new(Decimal::new(1000, 2)).unwrap(); // 10.00
/// let line = unit.times(2).unwrap();
/// assert_eq!(line.to_string(), "20.00");
///
/// assert!(Money::new(Decimal::new(-1, 0)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Fractional digits allowed in an amount.
    pub const SCALE: u32 = 2;

    /// Zero.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, Self::SCALE));

    /// Largest storable amount, 9999999999.99 (`NUMERIC(12,2)`).
    pub const MAX: Self = Self(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, Self::SCALE));

    /// Validate an amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero,
    /// [`MoneyError::TooPrecise`] for sub-cent amounts like `1.005` and
    /// [`MoneyError::TooLarge`] above [`Money::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let normalized = amount.normalize();
        if normalized.scale() > Self::SCALE {
            return Err(MoneyError::TooPrecise { max: Self::SCALE });
        }
        let mut amount = normalized.abs();
        amount.rescale(Self::SCALE);
        Self::bounded(amount)
    }

    fn bounded(amount: Decimal) -> Result<Self, MoneyError> {
        if amount > Self::MAX.0 {
            return Err(MoneyError::TooLarge);
        }
        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply by a quantity (for line totals).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for a negative quantity and
    /// [`MoneyError::TooLarge`] if the product exceeds [`Money::MAX`].
    pub fn times(self, quantity: i32) -> Result<Self, MoneyError> {
        if quantity < 0 {
            return Err(MoneyError::Negative);
        }
        self.0
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)
            .and_then(Self::bounded)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooLarge`] if the sum exceeds [`Money::MAX`].
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .ok_or(MoneyError::Overflow)
            .and_then(Self::bounded)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Sum for Money {
    /// Saturates at [`Money::MAX`]; callers that need overflow detection
    /// should fold with [`Money::checked_add`].
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc.checked_add(m).unwrap_or(Self::MAX))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
