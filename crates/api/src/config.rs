//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MERCATO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `MERCATO_JWT_SECRET` - Session token signing key (min 32 chars, high entropy)
//!
//! ## Optional
//! - `MERCATO_HOST` - Bind address (default: 127.0.0.1)
//! - `MERCATO_PORT` - Listen port (default: 3000)
//! - `MERCATO_TOKEN_TTL_MINUTES` - Session token lifetime (default: 60)
//! - `MERCATO_QUERY_TIMEOUT_MS` - Per-statement timeout (default: 5000)
//! - `MERCATO_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `MERCATO_DB_ACQUIRE_TIMEOUT_SECS` - Pool acquire timeout (default: 10)
//! - `MERCATO_TOTP_ISSUER` - Issuer shown in authenticator apps (default: Mercato)
//! - `MERCATO_CORS_ORIGIN` - Allowed browser origin (default: no CORS layer)
//! - `MERCATO_TRUST_PROXY_HEADERS` - Key rate limits on `X-Forwarded-For` /
//!   `X-Real-IP` instead of the peer address (default: false). Only enable
//!   behind a reverse proxy that overwrites these headers.
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Connection pool and statement timeout settings
    pub database: DatabaseSettings,
    /// Session token settings
    pub auth: AuthSettings,
    /// Allowed browser origin for CORS
    pub cors_origin: Option<String>,
    /// Whether rate limits may key on proxy-supplied client address headers
    pub trust_proxy_headers: bool,
    /// Sentry error tracking settings
    pub sentry: SentrySettings,
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Applied to every pooled connection as `statement_timeout`.
    pub query_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_millis(5000),
        }
    }
}

/// Session token and two-factor settings.
///
/// Implements `Debug` manually to redact the signing key.
#[derive(Clone)]
pub struct AuthSettings {
    /// HMAC key used to sign session tokens
    pub jwt_secret: SecretString,
    /// Lifetime of an issued session token
    pub token_ttl: Duration,
    /// Issuer label embedded in TOTP enrollment URIs
    pub totp_issuer: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("totp_issuer", &self.totp_issuer)
            .finish()
    }
}

/// Sentry client settings.
#[derive(Debug, Clone)]
pub struct SentrySettings {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MERCATO_DATABASE_URL")?;
        let host: IpAddr = parse_env_or_default("MERCATO_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("MERCATO_PORT", "3000")?;

        let database = DatabaseSettings {
            max_connections: parse_env_or_default("MERCATO_DB_MAX_CONNECTIONS", "10")?,
            acquire_timeout: Duration::from_secs(parse_env_or_default(
                "MERCATO_DB_ACQUIRE_TIMEOUT_SECS",
                "10",
            )?),
            query_timeout: Duration::from_millis(parse_env_or_default(
                "MERCATO_QUERY_TIMEOUT_MS",
                "5000",
            )?),
        };
        if database.max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MERCATO_DB_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let jwt_secret = get_validated_secret("MERCATO_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "MERCATO_JWT_SECRET")?;
        let token_ttl =
            token_ttl_from_minutes(parse_env_or_default("MERCATO_TOKEN_TTL_MINUTES", "60")?)?;
        let auth = AuthSettings {
            jwt_secret,
            token_ttl,
            totp_issuer: get_env_or_default("MERCATO_TOTP_ISSUER", "Mercato"),
        };

        let sentry = SentrySettings {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            database,
            auth,
            cors_origin: get_optional_env("MERCATO_CORS_ORIGIN"),
            trust_proxy_headers: parse_env_or_default("MERCATO_TRUST_PROXY_HEADERS", "false")?,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Convert `MERCATO_TOKEN_TTL_MINUTES` to a lifetime, rejecting zero and
/// values whose seconds do not fit a `u64`.
fn token_ttl_from_minutes(minutes: u64) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| {
        ConfigError::InvalidEnvVar("MERCATO_TOKEN_TTL_MINUTES".to_string(), reason.to_string())
    };
    if minutes == 0 {
        return Err(invalid("must be at least 1"));
    }
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid("too large"))
}

/// Validate that the signing key meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        for placeholder in ["your-jwt-key-here", "changeme123", "my-secret-signing-key"] {
            let err = validate_secret_strength(placeholder, "TEST_VAR").unwrap_err();
            assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        }
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_length() {
        assert!(validate_jwt_secret(&SecretString::from("short"), "K").is_err());
        assert!(validate_jwt_secret(&SecretString::from("k".repeat(32)), "K").is_ok());
    }

    #[test]
    fn test_parse_env_or_default_uses_default() {
        let port: u16 = parse_env_or_default("MERCATO_TEST_UNSET_PORT_VAR", "3000").unwrap();
        assert_eq!(port, 3000);

        let err = parse_env_or_default::<u16>("MERCATO_TEST_UNSET_PORT_VAR", "not-a-port")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "MERCATO_TEST_UNSET_PORT_VAR"));
    }

    #[test]
    fn test_token_ttl_from_minutes() {
        assert_eq!(token_ttl_from_minutes(60).unwrap(), Duration::from_secs(3600));
        assert!(matches!(
            token_ttl_from_minutes(0),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "MERCATO_TOKEN_TTL_MINUTES"
        ));
        assert!(matches!(
            token_ttl_from_minutes(u64::MAX / 60 + 1),
            Err(ConfigError::InvalidEnvVar(_, reason)) if reason == "too large"
        ));
        assert!(token_ttl_from_minutes(u64::MAX / 60).is_ok());
    }

    #[test]
    fn test_auth_settings_debug_redacts_secret() {
        let settings = AuthSettings {
            jwt_secret: SecretString::from("super_secret_signing_key_value"),
            token_ttl: Duration::from_secs(3600),
            totp_issuer: "Mercato".to_string(),
        };

        let debug_output = format!("{settings:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("Mercato"));
        assert!(!debug_output.contains("super_secret_signing_key_value"));
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            database: DatabaseSettings::default(),
            auth: AuthSettings {
                jwt_secret: SecretString::from("x".repeat(32)),
                token_ttl: Duration::from_secs(3600),
                totp_issuer: "Mercato".to_string(),
            },
            cors_origin: None,
            trust_proxy_headers: false,
            sentry: SentrySettings {
                dsn: None,
                environment: None,
                sample_rate: 1.0,
                traces_sample_rate: 0.0,
            },
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
