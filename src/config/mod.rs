//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading (with `.env` support)
//! - Configuration validation
//! - Default value handling
//! - Secure API key storage via [`SecretString`]
//!
//! # Example
//!
//! ```
//! use typing_coach::config::{Config, SecretString, DEFAULT_MODEL};
//!
//! // Build directly here; use Config::from_env() in production
//! let config = Config {
//!     api_key: SecretString::new("sk-ant-example-key"),
//!     model: DEFAULT_MODEL.to_string(),
//!     base_url: "https://api.anthropic.com/v1".to_string(),
//!     log_level: "info".to_string(),
//!     request_timeout_ms: 30_000,
//!     failure_threshold: 3,
//!     cooldown_secs: 300,
//!     max_format_retries: 2,
//!     retry_backoff_ms: 1000,
//!     snapshot_path: None,
//! };
//!
//! let debug = format!("{config:?}");
//! assert!(debug.contains("<REDACTED>"));
//! assert!(!debug.contains("sk-ant-example-key"));
//! ```

mod secret;
mod validation;

use std::time::Duration;

pub use secret::SecretString;
pub use validation::{
    validate_config, MAX_COOLDOWN_SECS, MAX_FAILURE_THRESHOLD, MAX_FORMAT_RETRIES,
    MAX_RETRY_BACKOFF_MS, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS,
};

pub use crate::anthropic::DEFAULT_MODEL;

use crate::anthropic::DEFAULT_BASE_URL;
use crate::coach::CoachSettings;
use crate::error::ConfigError;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default provider request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default number of consecutive provider failures that opens the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default breaker cooldown in seconds (5 minutes).
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// Default number of retries after a format failure.
pub const DEFAULT_MAX_FORMAT_RETRIES: u32 = 2;

/// Default linear backoff unit between retries, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Application configuration.
///
/// Use [`Config::from_env`] to load it from environment variables. The
/// `api_key` field uses [`SecretString`] to prevent accidental logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Anthropic API key.
    pub api_key: SecretString,
    /// Anthropic model to use.
    pub model: String,
    /// Base URL of the Anthropic API.
    pub base_url: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Timeout applied to every provider call.
    pub request_timeout_ms: u64,
    /// Consecutive provider failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open.
    pub cooldown_secs: u64,
    /// Retries allowed after a format failure.
    pub max_format_retries: u32,
    /// Linear backoff unit between retries.
    pub retry_backoff_ms: u64,
    /// Optional JSON document supplying the performance snapshot.
    pub snapshot_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `ANTHROPIC_API_KEY`
    ///
    /// Optional (with defaults):
    /// - `ANTHROPIC_MODEL` (`claude-sonnet-4-20250514`)
    /// - `ANTHROPIC_BASE_URL` (`https://api.anthropic.com/v1`)
    /// - `LOG_LEVEL` (`info`)
    /// - `REQUEST_TIMEOUT_MS` (`30000`)
    /// - `FAILURE_THRESHOLD` (`3`)
    /// - `COOLDOWN_SECS` (`300`)
    /// - `MAX_FORMAT_RETRIES` (`2`)
    /// - `RETRY_BACKOFF_MS` (`1000`)
    /// - `PERFORMANCE_SNAPSHOT_PATH` (unset)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the API key is missing, a numeric variable
    /// does not parse, or any value fails [`validate_config`].
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let api_key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| ConfigError::MissingRequired {
                var: "ANTHROPIC_API_KEY".into(),
            })?;

        let config = Self {
            api_key: SecretString::new(api_key),
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into()),
            request_timeout_ms: parse_env("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
            failure_threshold: parse_env("FAILURE_THRESHOLD", DEFAULT_FAILURE_THRESHOLD)?,
            cooldown_secs: parse_env("COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS)?,
            max_format_retries: parse_env("MAX_FORMAT_RETRIES", DEFAULT_MAX_FORMAT_RETRIES)?,
            retry_backoff_ms: parse_env("RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?,
            snapshot_path: std::env::var("PERFORMANCE_SNAPSHOT_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Pipeline tunables derived from this configuration.
    #[must_use]
    pub const fn coach_settings(&self) -> CoachSettings {
        CoachSettings {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_format_retries: self.max_format_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Parse an environment variable, using a default if it is not set.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a non-negative integer".into(),
        })
    })
}

/// A valid configuration for unit tests.
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        api_key: SecretString::new("test-key"),
        model: DEFAULT_MODEL.to_string(),
        base_url: DEFAULT_BASE_URL.to_string(),
        log_level: DEFAULT_LOG_LEVEL.to_string(),
        request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        cooldown_secs: DEFAULT_COOLDOWN_SECS,
        max_format_retries: DEFAULT_MAX_FORMAT_RETRIES,
        retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        snapshot_path: None,
    }
}
