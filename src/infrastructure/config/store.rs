//! Backing store configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which [`KeyStore`](crate::port::KeyStore) implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process maps; state is lost on restart and not shared.
    #[default]
    Memory,
    /// Redis server shared by every process pointing at it.
    Redis,
}

impl StoreBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

/// `[store]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Server URL, required for the redis backend. Overridden by `BALLAST_REDIS_URL`.
    #[serde(default)]
    pub url: Option<String>,
    /// Bound on each individual store call (milliseconds).
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
    /// Prepended to every key this process writes.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Period of the expired-entry sweep across caches (seconds, 0 disables).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_op_timeout_ms() -> u64 {
    250
}

fn default_key_prefix() -> String {
    "ballast:".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl StoreConfig {
    #[must_use]
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.op_timeout_ms == 0 {
            return Err(ConfigError::invalid("op_timeout_ms", "must be greater than 0"));
        }
        if self.key_prefix.contains(['*', '?', '[', ']']) {
            return Err(ConfigError::invalid(
                "key_prefix",
                "must not contain glob metacharacters",
            ));
        }
        if self.backend == StoreBackend::Redis
            && self.url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::MissingField { field: "url" });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            op_timeout_ms: default_op_timeout_ms(),
            key_prefix: default_key_prefix(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}
