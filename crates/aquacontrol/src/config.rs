//! Application configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use domain::RepositoryConfig;
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// A variable required by the chosen mode is not set.
    #[error("Missing required setting {0}")]
    Missing(&'static str),
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `DATABASE_MAX_CONNECTIONS` (default: `5`)
/// - `SNAPSHOT_INTERVAL`: events between snapshots, `0` disables (default: `50`)
/// - `MAX_COMMAND_ATTEMPTS`: total attempts on concurrency conflicts (default: `3`)
/// - `PROJECTION_RETRY_INTERVAL_SECS` (default: `5`)
/// - `METRICS_ADDR`: Prometheus listener (default: `"0.0.0.0:9000"`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub snapshot_interval: u64,
    pub max_command_attempts: u32,
    pub projection_retry_interval: Duration,
    pub metrics_addr: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_format = match var("LOG_FORMAT") {
            None => defaults.log_format,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT",
                        value,
                        reason: "expected text or json".to_string(),
                    });
                }
            },
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_or(
                &var,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            snapshot_interval: parse_or(&var, "SNAPSHOT_INTERVAL", defaults.snapshot_interval)?,
            max_command_attempts: parse_or(
                &var,
                "MAX_COMMAND_ATTEMPTS",
                defaults.max_command_attempts,
            )?,
            projection_retry_interval: Duration::from_secs(parse_or(
                &var,
                "PROJECTION_RETRY_INTERVAL_SECS",
                defaults.projection_retry_interval.as_secs(),
            )?),
            metrics_addr: parse_or(&var, "METRICS_ADDR", defaults.metrics_addr)?,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
        })
    }

    /// Returns the repository settings derived from this configuration.
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            snapshot_interval: self.snapshot_interval,
            max_attempts: self.max_command_attempts,
        }
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        let repository = RepositoryConfig::default();
        Self {
            database_url: None,
            database_max_connections: 5,
            snapshot_interval: repository.snapshot_interval,
            max_command_attempts: repository.max_attempts,
            projection_retry_interval: Duration::from_secs(5),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
