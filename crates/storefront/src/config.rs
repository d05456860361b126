//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional. Without `DATABASE_URL` the server starts in
//! demo mode on the bundled fallback dataset.
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `KAAYA_HOST` - Bind address (default: 127.0.0.1)
//! - `KAAYA_PORT` - Listen port (default: 3000)
//! - `BACKEND_URL` - Upstream backend for the login proxy
//! - `AUTH_TOKEN_SECRET` - HS256 secret; when set, bearer tokens must be signed
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated origins allowed to call the API
//! - `FALLBACK_ON_DB_ERROR` - Serve fallback catalog reads on DB errors (default: true)
//! - `KAAYA_LOG_JSON` - Emit JSON logs instead of text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
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
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` connection URL; `None` runs on the fallback store
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Upstream backend base URL for proxied auth calls
    pub backend_url: Option<Url>,
    /// Bearer-token settings
    pub auth: AuthConfig,
    /// Origins allowed by CORS (empty = same-origin only)
    pub cors_allowed_origins: Vec<String>,
    /// Serve fallback data when catalog reads hit a database error
    pub fallback_on_db_error: bool,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Bearer-token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// HS256 signing secret. Without it tokens are decoded but not verified.
    pub token_secret: Option<SecretString>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or if the token
    /// secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_optional_env("DATABASE_URL").map(SecretString::from);
        let host = parse_env("KAAYA_HOST", "127.0.0.1")?;
        let port = parse_env("KAAYA_PORT", "3000")?;

        let backend_url = get_optional_env("BACKEND_URL")
            .map(|raw| {
                Url::parse(&raw)
                    .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_URL".to_string(), e.to_string()))
            })
            .transpose()?;

        let token_secret = get_optional_env("AUTH_TOKEN_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "AUTH_TOKEN_SECRET")?;
                let secret = SecretString::from(value);
                validate_secret_length(&secret, "AUTH_TOKEN_SECRET")?;
                Ok::<_, ConfigError>(secret)
            })
            .transpose()?;

        Ok(Self {
            database_url,
            host,
            port,
            backend_url,
            auth: AuthConfig { token_secret },
            cors_allowed_origins: parse_origins(
                &get_optional_env("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            fallback_on_db_error: parse_bool_env("FALLBACK_ON_DB_ERROR", true)?,
            log_json: parse_bool_env("KAAYA_LOG_JSON", false)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Configuration for tests and demo runs: no database, no upstream.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            backend_url: None,
            auth: AuthConfig::default(),
            cors_allowed_origins: Vec::new(),
            fallback_on_db_error: true,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the server runs without a database.
    #[must_use]
    pub const fn is_demo_mode(&self) -> bool {
        self.database_url.is_none()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional, non-blank environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key)
        .as_deref()
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| parse_bool(&raw).ok_or_else(|| {
        ConfigError::InvalidEnvVar(key.to_string(), format!("expected a boolean, got '{raw}'"))
    }))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_edges() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let err = validate_secret_strength("your-token-secret-goes-here", "AUTH_TOKEN_SECRET")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        assert!(validate_secret_strength(&"ab".repeat(20), "AUTH_TOKEN_SECRET").is_err());
    }

    #[test]
    fn test_strong_secret_accepted() {
        let secret = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";
        assert!(validate_secret_strength(secret, "AUTH_TOKEN_SECRET").is_ok());
        assert!(validate_secret_length(&SecretString::from(secret), "AUTH_TOKEN_SECRET").is_err());
        assert!(
            validate_secret_length(&SecretString::from(format!("{secret}Zq")), "AUTH_TOKEN_SECRET")
                .is_ok()
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" YES "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins("https://kaayalife.in/, , http://localhost:5173");
        assert_eq!(origins, vec!["https://kaayalife.in", "http://localhost:5173"]);
    }

    #[test]
    fn test_demo_config() {
        let config = StorefrontConfig::demo();
        assert!(config.is_demo_mode());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let config = AuthConfig {
            token_secret: Some(SecretString::from("super_sensitive_value")),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_sensitive_value"));
    }
}
