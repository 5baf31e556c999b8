//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Service errors convert into
//! `AppError` here, in one place, and the response always has the shape
//!
//! ```json
//! {"error": {"category": "conflict", "message": "..."}}
//! ```
//!
//! Server-side failures are captured to Sentry before the response is built
//! and their details never reach the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::attempts::REPLENISH_PERIOD;
use crate::services::auth::{AuthError, TokenError};
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;
use crate::services::two_factor::TwoFactorError;

/// Seconds a client should wait before retrying after a query timeout.
const RETRY_AFTER_SECONDS: &str = "1";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing input; nothing was changed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, invalid or expired session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid session, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Too many attempts; the client should wait before retrying.
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate payment confirmation or unique field.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced record no longer exists.
    #[error("Referential error: {0}")]
    Referential(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    category: &'static str,
    message: &'a str,
}

impl AppError {
    /// Stable machine-checkable category.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Database(RepositoryError::OutOfRange) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::TooManyRequests(_) => "rate_limited",
            Self::NotFound(_) | Self::Database(RepositoryError::NotFound) => "not_found",
            Self::Conflict(_) | Self::Database(RepositoryError::Conflict(_)) => "conflict",
            Self::Referential(_) | Self::Database(RepositoryError::ForeignKey(_)) => {
                "referential"
            }
            Self::Database(RepositoryError::Timeout) => "timeout",
            Self::Database(_) => "persistence",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Database(RepositoryError::OutOfRange) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) | Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::Database(RepositoryError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            Self::Referential(_) | Self::Database(RepositoryError::ForeignKey(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Database(RepositoryError::Timeout) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::TooManyRequests(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Referential(msg) => msg.clone(),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::OutOfRange) => {
                format!("Amount exceeds the maximum of {}", mercato_core::Money::MAX)
            }
            Self::Database(RepositoryError::Conflict(_)) => {
                "Conflicts with an existing record".to_string()
            }
            Self::Database(RepositoryError::ForeignKey(_)) => {
                "References a record that does not exist".to_string()
            }
            Self::Database(RepositoryError::Timeout) => {
                "The database did not respond in time, please retry".to_string()
            }
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                category = self.category(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message();
        let body = ErrorBody {
            error: ErrorDetail {
                category: self.category(),
                message: &message,
            },
        };

        let mut response = (status, Json(body)).into_response();
        match self {
            Self::Database(RepositoryError::Timeout) => {
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECONDS));
            }
            Self::TooManyRequests(_) => {
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(REPLENISH_PERIOD.as_secs()));
            }
            _ => {}
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Service error conversions
// =============================================================================

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail(_)
            | AuthError::InvalidUsername(_)
            | AuthError::WeakPassword(_) => Self::Validation(err.to_string()),
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            AuthError::TooManyAttempts => {
                Self::TooManyRequests("Too many attempts, try again later".to_string())
            }
            AuthError::Token(TokenError::Invalid) => {
                Self::Unauthorized("Invalid or expired token".to_string())
            }
            AuthError::UserNotFound => Self::NotFound("User not found".to_string()),
            AuthError::UserAlreadyExists(_) => Self::Conflict(err.to_string()),
            AuthError::SelfRoleChange => Self::Forbidden(err.to_string()),
            AuthError::Repository(e) => Self::Database(e),
            AuthError::Token(TokenError::Sign(_)) | AuthError::PasswordHash => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<TwoFactorError> for AppError {
    fn from(err: TwoFactorError) -> Self {
        match err {
            TwoFactorError::AlreadyEnabled => Self::Conflict(err.to_string()),
            TwoFactorError::InvalidSecret(_) | TwoFactorError::InvalidCode => {
                Self::Validation(err.to_string())
            }
            TwoFactorError::PasswordMismatch => Self::Forbidden(err.to_string()),
            TwoFactorError::UserNotFound => {
                Self::Unauthorized("Session user no longer exists".to_string())
            }
            TwoFactorError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity(msg) => Self::Validation(msg),
            CartError::ProductNotFound(_) => Self::NotFound(err.to_string()),
            CartError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(msg) => Self::Validation(msg),
            CheckoutError::DuplicatePayment(_) => Self::Conflict(err.to_string()),
            CheckoutError::Referential(_) => {
                Self::Referential("Order references a product that no longer exists".to_string())
            }
            CheckoutError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStatus(e) => Self::Validation(e.to_string()),
            OrderError::NotFound => Self::NotFound("Order not found".to_string()),
            OrderError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

// =============================================================================
// Sentry helpers
// =============================================================================

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Option<HeaderValue>, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let retry_after = response.headers().get(RETRY_AFTER).cloned();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, retry_after, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 9".to_string());
        assert_eq!(err.to_string(), "Not found: order 9");

        let err = AppError::Validation("cart is empty".to_string());
        assert_eq!(err.to_string(), "Validation error: cart is empty");
    }

    #[test]
    fn test_app_error_status_codes() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                AppError::Referential("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::Database(RepositoryError::Timeout),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Database(RepositoryError::DataCorruption("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn test_body_carries_category_and_message() {
        let (status, retry_after, body) =
            body_json(AppError::Conflict("already registered".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(retry_after.is_none());
        assert_eq!(body["error"]["category"], "conflict");
        assert_eq!(body["error"]["message"], "already registered");
    }

    #[tokio::test]
    async fn test_timeout_is_retryable() {
        let (status, retry_after, body) = body_json(AppError::Database(RepositoryError::Timeout)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(retry_after.unwrap(), "1");
        assert_eq!(body["error"]["category"], "timeout");
    }

    #[tokio::test]
    async fn test_throttled_login_asks_client_to_wait() {
        let (status, retry_after, body) = body_json(AuthError::TooManyAttempts.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(retry_after.unwrap(), "30");
        assert_eq!(body["error"]["category"], "rate_limited");
    }

    #[tokio::test]
    async fn test_out_of_range_value_is_a_client_error() {
        let (status, _, body) = body_json(AppError::Database(RepositoryError::OutOfRange)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["category"], "validation");
        assert_eq!(
            body["error"]["message"],
            "Amount exceeds the maximum of 9999999999.99"
        );
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let (_, _, body) = body_json(AppError::Database(RepositoryError::DataCorruption(
            "stored TOTP secret for user 4 is unusable".to_string(),
        )))
        .await;
        assert_eq!(body["error"]["category"], "persistence");
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[test]
    fn test_service_errors_map_to_categories() {
        assert_eq!(
            AppError::from(CheckoutError::DuplicatePayment("pi_1".into())).category(),
            "conflict"
        );
        assert_eq!(
            AppError::from(CheckoutError::Referential("fk".into())).category(),
            "referential"
        );
        assert_eq!(
            AppError::from(TwoFactorError::PasswordMismatch).category(),
            "forbidden"
        );
        assert_eq!(
            AppError::from(TwoFactorError::InvalidCode).category(),
            "validation"
        );
        assert_eq!(AppError::from(AuthError::SelfRoleChange).category(), "forbidden");
        assert_eq!(
            AppError::from(AuthError::InvalidCredentials).category(),
            "unauthorized"
        );
        assert_eq!(
            AppError::from(OrderError::InvalidStatus(
                mercato_core::UnknownOrderStatus("Lost".into())
            ))
            .category(),
            "validation"
        );
        assert_eq!(
            AppError::from(CartError::ProductNotFound(mercato_core::ProductId::new(3))).category(),
            "not_found"
        );
    }
}
