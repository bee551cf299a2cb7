//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COPYR_*)
//! 2. TOML config file (if COPYR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COPYR_*)
/// 2. TOML config file (if COPYR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via COPYR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the REST API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment name, reported by `/api/status`.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// User-Agent string for metadata API requests.
    ///
    /// MusicBrainz rejects anonymous agents, so this must identify the service.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_loc_base_url")]
    pub loc_base_url: String,

    #[serde(default = "default_hathitrust_base_url")]
    pub hathitrust_base_url: String,

    #[serde(default = "default_musicbrainz_base_url")]
    pub musicbrainz_base_url: String,

    /// Minimum spacing between Library of Congress requests.
    #[serde(default = "default_one_second_ms")]
    pub loc_min_interval_ms: u64,

    /// Minimum spacing between HathiTrust requests.
    #[serde(default = "default_one_second_ms")]
    pub hathitrust_min_interval_ms: u64,

    /// Minimum spacing between MusicBrainz requests (their policy is 1 req/s).
    #[serde(default = "default_musicbrainz_interval_ms")]
    pub musicbrainz_min_interval_ms: u64,

    /// Lifetime of a cached work before it is considered expired.
    #[serde(default = "default_work_cache_ttl_secs")]
    pub work_cache_ttl_secs: i64,

    /// Lifetime of a memoized search query.
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: i64,

    /// Entries expired for longer than this are deleted by cleanup.
    #[serde(default = "default_cleanup_after_days")]
    pub cleanup_after_days: i64,

    /// Country used when a request does not name one.
    #[serde(default = "default_country")]
    pub default_country: String,

    /// HS256 secret for bearer tokens.
    ///
    /// Set via COPYR_JWT_SECRET. Authenticated endpoints reject every
    /// request while this is unset.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Admin login is disabled unless both username and password are set.
    #[serde(default)]
    pub admin_username: Option<String>,

    #[serde(default)]
    pub admin_password: Option<String>,

    #[serde(default = "default_admin_user_id")]
    pub admin_user_id: String,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    /// Searches an anonymous client may run per window (`SEARCH_LIMIT`).
    #[serde(default = "default_anonymous_search_limit")]
    pub anonymous_search_limit: u32,

    #[serde(default = "default_day_secs")]
    pub anonymous_search_window_secs: u64,

    /// Requests per client per window across the whole API.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    #[serde(default = "default_hour_secs")]
    pub rate_limit_window_secs: u64,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Reverse proxies whose `X-Forwarded-For` header is trusted.
    /// Other peers are identified by their socket address.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,

    /// Whether the background refresh/cleanup/prepopulate tasks run.
    #[serde(default)]
    pub scheduler_enabled: bool,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_day_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_day_secs")]
    pub prepopulate_interval_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./copyr-cache.sqlite")
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".into()
}

fn default_environment() -> String {
    "development".into()
}

fn default_user_agent() -> String {
    "copyr.ai/1.0 (copyright research tool; contact@copyr.ai)".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_loc_base_url() -> String {
    "http://lx2.loc.gov:210/LCDB".into()
}

fn default_hathitrust_base_url() -> String {
    "https://catalog.hathitrust.org/api/volumes/brief/json".into()
}

fn default_musicbrainz_base_url() -> String {
    "https://musicbrainz.org/ws/2".into()
}

fn default_one_second_ms() -> u64 {
    1_000
}

fn default_musicbrainz_interval_ms() -> u64 {
    1_100
}

fn default_work_cache_ttl_secs() -> i64 {
    7 * 24 * 3600
}

fn default_search_cache_ttl_secs() -> i64 {
    24 * 3600
}

fn default_cleanup_after_days() -> i64 {
    30
}

fn default_country() -> String {
    "US".into()
}

fn default_admin_user_id() -> String {
    "123e4567-e89b-12d3-a456-426614174000".into()
}

fn default_admin_email() -> String {
    "admin@copyr.ai".into()
}

fn default_anonymous_search_limit() -> u32 {
    2
}

fn default_rate_limit_max_requests() -> u32 {
    100
}

fn default_hour_secs() -> u64 {
    3600
}

fn default_day_secs() -> u64 {
    86_400
}

fn default_refresh_interval_secs() -> u64 {
    6 * 3600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            environment: default_environment(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            loc_base_url: default_loc_base_url(),
            hathitrust_base_url: default_hathitrust_base_url(),
            musicbrainz_base_url: default_musicbrainz_base_url(),
            loc_min_interval_ms: default_one_second_ms(),
            hathitrust_min_interval_ms: default_one_second_ms(),
            musicbrainz_min_interval_ms: default_musicbrainz_interval_ms(),
            work_cache_ttl_secs: default_work_cache_ttl_secs(),
            search_cache_ttl_secs: default_search_cache_ttl_secs(),
            cleanup_after_days: default_cleanup_after_days(),
            default_country: default_country(),
            jwt_secret: None,
            admin_username: None,
            admin_password: None,
            admin_user_id: default_admin_user_id(),
            admin_email: default_admin_email(),
            anonymous_search_limit: default_anonymous_search_limit(),
            anonymous_search_window_secs: default_day_secs(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_secs: default_hour_secs(),
            cors_origins: Vec::new(),
            trusted_proxies: Vec::new(),
            scheduler_enabled: false,
            refresh_interval_secs: default_refresh_interval_secs(),
            cleanup_interval_secs: default_day_secs(),
            prepopulate_interval_secs: default_day_secs(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COPYR_`
    /// 2. TOML file from `COPYR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COPYR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COPYR_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// JWT secret, required before any token can be issued or verified.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the secret is not set.
    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "jwt_secret".into(),
            hint: "Set COPYR_JWT_SECRET environment variable".into(),
        })
    }

    /// Admin credentials when admin login is enabled.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (self.admin_username.as_deref(), self.admin_password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./copyr-cache.sqlite"));
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.musicbrainz_min_interval_ms, 1_100);
        assert_eq!(config.work_cache_ttl_secs, 604_800);
        assert_eq!(config.search_cache_ttl_secs, 86_400);
        assert_eq!(config.anonymous_search_limit, 2);
        assert_eq!(config.default_country, "US");
        assert!(config.jwt_secret.is_none());
        assert!(!config.scheduler_enabled);
        assert!(config.trusted_proxies.is_empty());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_require_jwt_secret_missing() {
        let config = AppConfig::default();
        let result = config.require_jwt_secret();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_jwt_secret_present() {
        let config = AppConfig { jwt_secret: Some("s".repeat(32)), ..Default::default() };
        assert_eq!(config.require_jwt_secret().unwrap().len(), 32);
    }

    #[test]
    fn test_admin_credentials_need_both_fields() {
        let config = AppConfig { admin_username: Some("admin".into()), ..Default::default() };
        assert!(config.admin_credentials().is_none());

        let config = AppConfig {
            admin_username: Some("admin".into()),
            admin_password: Some("hunter22".into()),
            ..Default::default()
        };
        assert_eq!(config.admin_credentials(), Some(("admin", "hunter22")));
    }
}
