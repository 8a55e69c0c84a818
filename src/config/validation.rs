//! Configuration validation.
//!
//! Range checks applied after [`Config`] is assembled from the environment.

use super::Config;
use crate::error::ConfigError;

/// Minimum allowed provider timeout in milliseconds (1 second).
pub const MIN_TIMEOUT_MS: u64 = 1000;

/// Maximum allowed provider timeout in milliseconds (5 minutes).
pub const MAX_TIMEOUT_MS: u64 = 300_000;

/// Maximum allowed failure threshold.
pub const MAX_FAILURE_THRESHOLD: u32 = 20;

/// Maximum allowed cooldown in seconds (1 hour).
pub const MAX_COOLDOWN_SECS: u64 = 3600;

/// Maximum allowed format retries.
pub const MAX_FORMAT_RETRIES: u32 = 5;

/// Maximum allowed retry backoff unit in milliseconds.
pub const MAX_RETRY_BACKOFF_MS: u64 = 10_000;

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if any value is out of range:
/// - `ANTHROPIC_API_KEY` must not be blank
/// - `REQUEST_TIMEOUT_MS` must be between 1000 and 300000
/// - `FAILURE_THRESHOLD` must be between 1 and 20
/// - `COOLDOWN_SECS` must be between 1 and 3600
/// - `MAX_FORMAT_RETRIES` must be at most 5
/// - `RETRY_BACKOFF_MS` must be at most 10000
#[must_use = "validation result should be checked"]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.api_key.is_blank() {
        return Err(invalid("ANTHROPIC_API_KEY", "must not be empty"));
    }

    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&config.request_timeout_ms) {
        return Err(invalid(
            "REQUEST_TIMEOUT_MS",
            format!("must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"),
        ));
    }

    if !(1..=MAX_FAILURE_THRESHOLD).contains(&config.failure_threshold) {
        return Err(invalid(
            "FAILURE_THRESHOLD",
            format!("must be between 1 and {MAX_FAILURE_THRESHOLD}"),
        ));
    }

    if !(1..=MAX_COOLDOWN_SECS).contains(&config.cooldown_secs) {
        return Err(invalid(
            "COOLDOWN_SECS",
            format!("must be between 1 and {MAX_COOLDOWN_SECS}"),
        ));
    }

    if config.max_format_retries > MAX_FORMAT_RETRIES {
        return Err(invalid(
            "MAX_FORMAT_RETRIES",
            format!("must be at most {MAX_FORMAT_RETRIES}"),
        ));
    }

    if config.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
        return Err(invalid(
            "RETRY_BACKOFF_MS",
            format!("must be at most {MAX_RETRY_BACKOFF_MS}"),
        ));
    }

    if config.model.trim().is_empty() {
        return Err(invalid("ANTHROPIC_MODEL", "must not be empty"));
    }

    Ok(())
}

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&test_config()).is_ok());
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let mut config = test_config();
        config.api_key = "  ".into();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = test_config();
        config.request_timeout_ms = MIN_TIMEOUT_MS;
        assert!(validate_config(&config).is_ok());
        config.request_timeout_ms = MAX_TIMEOUT_MS + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_failure_threshold_rejected() {
        let mut config = test_config();
        config.failure_threshold = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "FAILURE_THRESHOLD"));
    }

    #[test]
    fn test_cooldown_bounds() {
        let mut config = test_config();
        config.cooldown_secs = 0;
        assert!(validate_config(&config).is_err());
        config.cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_format_retries_bound() {
        let mut config = test_config();
        config.max_format_retries = MAX_FORMAT_RETRIES + 1;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "MAX_FORMAT_RETRIES"));
    }

    #[test]
    fn test_backoff_bound() {
        let mut config = test_config();
        config.retry_backoff_ms = MAX_RETRY_BACKOFF_MS + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_blank_model_rejected() {
        let mut config = test_config();
        config.model = String::new();
        assert!(validate_config(&config).is_err());
    }
}
