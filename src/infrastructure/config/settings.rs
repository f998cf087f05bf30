//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. Every
//! section is optional and falls back to its defaults. The backing store URL
//! can be supplied through `BALLAST_REDIS_URL` instead of the file.
//!
//! # Example
//!
//! ```no_run
//! use ballast::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::cache::CacheConfig;
use super::logging::LoggingConfig;
use super::observability::ObservabilityConfig;
use super::reconnect::ReconnectionConfig;
use super::store::{StoreBackend, StoreConfig};
use super::throttle::{validate_name, ThrottleConfig};
use crate::error::{ConfigError, Result};

/// Environment variable that overrides `store.url`.
pub const REDIS_URL_ENV: &str = "BALLAST_REDIS_URL";

/// Main configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Backing key/counter store shared by throttles and caches.
    #[serde(default)]
    pub store: StoreConfig,

    /// Stream reconnection backoff.
    #[serde(default)]
    pub reconnect: ReconnectionConfig,

    /// Throttle presets.
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Named result caches, one disjoint key namespace each.
    #[serde(default)]
    pub cache: BTreeMap<String, CacheConfig>,

    /// Performance sample retention.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Applies the `BALLAST_REDIS_URL` override, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(url) = std::env::var(REDIS_URL_ENV) {
            if !url.trim().is_empty() {
                config.store.url = Some(url);
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize the global tracing subscriber from `[logging]`.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Validate configuration values.
    ///
    /// Builds every derived policy once so constructors downstream cannot fail
    /// on values that passed here.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.logging.validate()?;
        self.store.validate()?;
        self.reconnect.to_policy()?;
        self.throttle.limits()?;
        for (name, cache) in &self.cache {
            validate_name(name).map_err(|_| {
                ConfigError::invalid(
                    "cache",
                    format!("cache name '{name}' must use letters, digits, '-' or '_'"),
                )
            })?;
            cache.validate()?;
            if cache.max_entries.is_some() && self.store.backend == StoreBackend::Redis {
                return Err(ConfigError::invalid(
                    "max_entries",
                    format!("cache '{name}': the redis backend cannot bound entry counts"),
                ));
            }
        }
        self.observability.validate()?;
        Ok(())
    }
}
