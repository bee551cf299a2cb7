//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::copyright::registry;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - a cache TTL or the anonymous search window is not positive
    /// - `default_country` has no registered calculator
    /// - `jwt_secret` is set but shorter than 32 bytes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.work_cache_ttl_secs <= 0 {
            return Err(invalid("work_cache_ttl_secs", "must be greater than 0"));
        }
        if self.search_cache_ttl_secs <= 0 {
            return Err(invalid("search_cache_ttl_secs", "must be greater than 0"));
        }
        if self.cleanup_after_days < 0 {
            return Err(invalid("cleanup_after_days", "must not be negative"));
        }

        if self.anonymous_search_window_secs == 0 {
            return Err(invalid("anonymous_search_window_secs", "must be greater than 0"));
        }
        if self.rate_limit_max_requests == 0 || self.rate_limit_window_secs == 0 {
            return Err(invalid("rate_limit_max_requests", "limit and window must be greater than 0"));
        }

        if !registry::is_country_supported(&self.default_country) {
            return Err(invalid("default_country", "no copyright calculator registered for this country"));
        }

        if let Some(secret) = &self.jwt_secret
            && secret.len() < 32
        {
            return Err(invalid("jwt_secret", "must be at least 32 bytes"));
        }

        if self.admin_credentials().is_some() && self.jwt_secret.is_none() {
            tracing::warn!("admin credentials are set but jwt_secret is not; admin login will be rejected");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_non_positive_ttl() {
        let config = AppConfig { work_cache_ttl_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "work_cache_ttl_secs"));
    }

    #[test]
    fn test_validate_unsupported_country() {
        let config = AppConfig { default_country: "FR".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "default_country"));
    }

    #[test]
    fn test_validate_country_case_insensitive() {
        let config = AppConfig { default_country: "us".into(), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_short_jwt_secret() {
        let config = AppConfig { jwt_secret: Some("short".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "jwt_secret"));
    }
}
