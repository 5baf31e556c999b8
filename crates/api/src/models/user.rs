//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use core::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use mercato_core::{Email, UserId};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username must be between {min} and {max} characters")]
    Length { min: usize, max: usize },
    #[error("username may only contain letters, digits, '.', '_' and '-'")]
    InvalidCharacter,
}

/// A login name: 3 to 32 characters of `[A-Za-z0-9_.-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 32;

    /// Parse a username, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`UsernameError`] if the length or character set is wrong.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let s = s.trim();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) {
            return Err(UsernameError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(UsernameError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A shop user (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// User's email address.
    pub email: Email,
    /// Whether the user may use the admin endpoints.
    pub is_admin: bool,
    /// Whether login requires a TOTP code.
    pub two_factor_enabled: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A user together with the secrets needed to authenticate them.
///
/// `two_factor_secret` is `Some` exactly when `user.two_factor_enabled` is
/// true; the repository refuses to build one that breaks this.
pub struct UserCredentials {
    pub user: User,
    /// Argon2 PHC string.
    pub password_hash: SecretString,
    /// Base32 TOTP shared secret.
    pub two_factor_secret: Option<SecretString>,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user", &self.user)
            .field("password_hash", &"[REDACTED]")
            .field(
                "two_factor_secret",
                &self.two_factor_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_username_accepts_allowed_characters() {
        let name = Username::parse("  ada.lovelace_1-x ").unwrap();
        assert_eq!(name.as_str(), "ada.lovelace_1-x");
    }

    #[test]
    fn test_username_length_bounds() {
        assert!(matches!(
            Username::parse("ab"),
            Err(UsernameError::Length { .. })
        ));
        assert!(Username::parse("abc").is_ok());
        assert!(Username::parse(&"a".repeat(32)).is_ok());
        assert!(Username::parse(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_username_rejects_other_characters() {
        for bad in ["has space", "emoji😀x", "semi;colon", "at@sign"] {
            assert_eq!(Username::parse(bad), Err(UsernameError::InvalidCharacter));
        }
    }
}
