//! Named result cache configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// `[cache.<name>]` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one. Unset means no expiry.
    pub default_ttl_secs: Option<u64>,
    /// Upper bound on live entries; the oldest are trimmed beyond it.
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl_secs == Some(0) {
            return Err(ConfigError::invalid("default_ttl_secs", "must be greater than 0"));
        }
        if self.max_entries == Some(0) {
            return Err(ConfigError::invalid("max_entries", "must be greater than 0"));
        }
        Ok(())
    }
}
