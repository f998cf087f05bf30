//! Reconnection backoff configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::ReconnectPolicy;
use crate::error::ConfigError;

/// Stream reconnection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Attempts before a connection is declared failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first reconnection attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to delay after each failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Relative jitter applied to each delay, in `[0, 1)`.
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_max_delay_ms() -> u64 {
    60000 // 60 seconds
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.1
}

impl ReconnectionConfig {
    /// Build the validated policy these settings describe.
    pub fn to_policy(&self) -> Result<ReconnectPolicy, ConfigError> {
        ReconnectPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_factor,
            self.jitter_fraction,
        )
    }
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}
