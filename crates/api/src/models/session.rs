//! Session token types.
//!
//! Sessions are stateless: the signed token carries the claims below and
//! nothing is stored server-side.

use serde::{Deserialize, Serialize};

use mercato_core::UserId;

/// Claims carried in a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// User's database ID, as a string per the JWT `sub` convention.
    pub sub: String,
    /// Username at the time the token was issued.
    pub username: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Identity of the authenticated caller, taken from a verified token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Username at the time the token was issued.
    pub username: String,
}

impl TryFrom<SessionClaims> for CurrentUser {
    type Error = std::num::ParseIntError;

    fn try_from(claims: SessionClaims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(claims.sub.parse()?),
            username: claims.username,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_current_user_from_claims() {
        let claims = SessionClaims {
            sub: "42".to_string(),
            username: "ada".to_string(),
            iat: 0,
            exp: 60,
        };
        let user = CurrentUser::try_from(claims).unwrap();
        assert_eq!(user.id, UserId::new(42));
        assert_eq!(user.username, "ada");
    }

    #[test]
    fn test_non_numeric_subject_is_rejected() {
        let claims = SessionClaims {
            sub: "ada".to_string(),
            username: "ada".to_string(),
            iat: 0,
            exp: 60,
        };
        assert!(CurrentUser::try_from(claims).is_err());
    }
}
