//! Checkout error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::orders::PAYMENT_CONFIRMATION_CONSTRAINT;

/// Errors that can occur while placing an order.
///
/// Every variant other than `Validation` is raised after the transaction
/// has begun and means it was rolled back.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Bad or missing input. Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// An order already exists for this payment confirmation id.
    #[error("an order already exists for payment confirmation {0}")]
    DuplicatePayment(String),

    /// A line references a product (or the order an address) that no
    /// longer exists. Carries the violated constraint.
    #[error("order references a record that no longer exists ({0})")]
    Referential(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl CheckoutError {
    pub(crate) fn from_repository(e: RepositoryError, payment_confirmation_id: &str) -> Self {
        match e {
            e if e.is_conflict_on(PAYMENT_CONFIRMATION_CONSTRAINT) => {
                Self::DuplicatePayment(payment_confirmation_id.to_owned())
            }
            RepositoryError::ForeignKey(constraint) => Self::Referential(constraint),
            other => Self::Repository(other),
        }
    }
}

impl From<RepositoryError> for CheckoutError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::ForeignKey(constraint) => Self::Referential(constraint),
            other => Self::Repository(other),
        }
    }
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        RepositoryError::from(e).into()
    }
}
