//! Application configuration loaded from environment variables.
//!
//! Fail-fast loading: required variables must be present and valid or the
//! process exits with a clear error message before any I/O happens.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Application environment mode.
///
/// Development mode relaxes endpoint address validation to allow plain
/// HTTP, which delivery targets in local setups typically use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse from the `APP_ENV` environment variable value.
    /// Defaults to `Development` if unset or unrecognized.
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => {
                eprintln!("Unrecognized APP_ENV value {other:?}, defaulting to development");
                Self::Development
            }
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Bind address for the management API.
    pub host: String,

    /// Bind port for the management API.
    pub port: u16,

    /// Environment mode.
    pub app_env: AppEnvironment,

    /// Log filter directive.
    pub rust_log: String,

    /// PEM-encoded ECDSA P-384 private key (PKCS#8) used for request signing.
    pub signing_key_pem: String,

    /// Key identifier carried in the `keyid` signature parameter.
    pub signing_key_id: String,

    /// CloudEvents `source` URI identifying this producer.
    pub cloud_event_source: String,

    /// Delivery poll interval.
    pub poll_interval: Duration,

    /// Maximum messages dispatched per poll.
    pub batch_size: usize,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require_var("DATABASE_URL")?;
        let signing_key_pem = require_var("SIGNING_KEY_PEM")?;
        let signing_key_id = require_var("SIGNING_KEY_ID")?;
        let cloud_event_source = require_var("CLOUD_EVENT_SOURCE")?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT", 8080)?;
        let app_env = AppEnvironment::from_env_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let poll_interval = Duration::from_secs(parse_var("POLL_INTERVAL_SECS", 60)?);
        let batch_size = parse_var("BATCH_SIZE", 20)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                var: "BATCH_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url,
            host,
            port,
            app_env,
            rust_log,
            signing_key_pem,
            signing_key_id,
            cloud_event_source,
            poll_interval,
            batch_size,
        })
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|e| ConfigError::InvalidValue {
            var: name.to_string(),
            message: format!("{e}"),
        }),
        _ => Ok(default),
    }
}
