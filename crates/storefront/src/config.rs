//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `ADMIN_API_TOKEN` - Bearer token for `/admin/api` (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CART_TTL_HOURS` - Cart lifetime after the last change (default: 168)
//! - `EMAIL_API_KEY` - Transactional email API key; email is disabled when unset
//! - `EMAIL_FROM` - Sender identity, required when `EMAIL_API_KEY` is set
//! - `EMAIL_API_BASE_URL` - Email API base URL (default: <https://api.resend.com>)
//! - `ADMIN_NOTIFICATION_EMAIL` - Receives a notice for every completed order
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use ticket_booth_core::Email;

const MIN_ADMIN_TOKEN_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CART_TTL_HOURS: i64 = 168;
const DEFAULT_EMAIL_API_BASE_URL: &str = "https://api.resend.com";

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

/// Storefront application configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Bearer token accepted by the admin API
    pub admin_api_token: SecretString,
    /// Cart lifetime after the last change, in hours
    pub cart_ttl_hours: i64,
    /// Transactional email settings; `None` disables sending
    pub email: Option<EmailConfig>,
    /// Sentry settings
    pub sentry: SentryConfig,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("admin_api_token", &"[REDACTED]")
            .field("cart_ttl_hours", &self.cart_ttl_hours)
            .field("email", &self.email)
            .field("sentry", &self.sentry)
            .finish()
    }
}

/// Transactional email API configuration.
#[derive(Clone)]
pub struct EmailConfig {
    /// API key sent as a bearer token
    pub api_key: SecretString,
    /// Sender identity, e.g. `Ticket Booth <tickets@yourdomain.com>`
    pub from: String,
    /// Provider base URL; messages are posted to `{base}/emails`
    pub api_base_url: Url,
    /// Address notified when an order is completed
    pub admin_notification_email: Option<Email>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &"[REDACTED]")
            .field("from", &self.from)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("admin_notification_email", &self.admin_notification_email)
            .finish()
    }
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.1,
        }
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let admin_api_token = get_validated_secret("ADMIN_API_TOKEN")?;
        validate_token_length(&admin_api_token, "ADMIN_API_TOKEN")?;

        let cart_ttl_hours: i64 =
            parse_env("CART_TTL_HOURS", &DEFAULT_CART_TTL_HOURS.to_string())?;
        if cart_ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_TTL_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            admin_api_token,
            cart_ttl_hours,
            email: EmailConfig::from_env()?,
            sentry: SentryConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("EMAIL_API_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&api_key, "EMAIL_API_KEY")?;

        let from = get_required_env("EMAIL_FROM")?;
        let api_base_url = Url::parse(&get_env_or_default(
            "EMAIL_API_BASE_URL",
            DEFAULT_EMAIL_API_BASE_URL,
        ))
        .map_err(|e| ConfigError::InvalidEnvVar("EMAIL_API_BASE_URL".to_string(), e.to_string()))?;
        let admin_notification_email = get_optional_env("ADMIN_NOTIFICATION_EMAIL")
            .map(|value| {
                Email::parse(&value).map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "ADMIN_NOTIFICATION_EMAIL".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            from,
            api_base_url,
            admin_notification_email,
        }))
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a token meets minimum length requirements.
fn validate_token_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_ADMIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_ADMIN_TOKEN_LENGTH,
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
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
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_ADMIN_TOKEN: &str = "aB3xY9mK2nL5pQ7rT0uW4zC6dE8fG1hJ";

    pub(crate) fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/ticket_booth_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            admin_api_token: SecretString::from(TEST_ADMIN_TOKEN),
            cart_ttl_hours: DEFAULT_CART_TTL_HOURS,
            email: None,
            sentry: SentryConfig::default(),
        }
    }

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
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-email-api-key", "EMAIL_API_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("re_changeme123", "EMAIL_API_KEY").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(TEST_ADMIN_TOKEN, "ADMIN_API_TOKEN").is_ok());
        assert!(validate_secret_strength("re_9fK2mQx7LpZ4vB8nR1tY6wH3", "EMAIL_API_KEY").is_ok());
    }

    #[test]
    fn test_validate_token_length() {
        assert!(validate_token_length(&SecretString::from("short"), "ADMIN_API_TOKEN").is_err());
        assert!(
            validate_token_length(&SecretString::from(TEST_ADMIN_TOKEN), "ADMIN_API_TOKEN")
                .is_ok()
        );
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = test_config();
        config.email = Some(EmailConfig {
            api_key: SecretString::from("re_super_private_value"),
            from: "Ticket Booth <tickets@booth.test>".to_string(),
            api_base_url: Url::parse(DEFAULT_EMAIL_API_BASE_URL).unwrap(),
            admin_notification_email: None,
        });

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("tickets@booth.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(TEST_ADMIN_TOKEN));
        assert!(!debug_output.contains("re_super_private_value"));
        assert!(!debug_output.contains("ticket_booth_test"));
    }
}
