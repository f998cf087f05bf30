//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::time::Duration;

use crate::domain::ReconnectPolicy;
use crate::infrastructure::config::{CacheConfig, Config};

/// Deterministic policy: delays 1s, 2s, 4s, ... capped at 8s, no jitter.
pub fn policy(max_retries: u32) -> ReconnectPolicy {
    ReconnectPolicy::new(
        max_retries,
        Duration::from_secs(1),
        Duration::from_secs(8),
        2.0,
        0.0,
    )
    .expect("valid test policy")
}

/// Memory-backed config with one `quotes` cache and no background sweep.
pub fn config() -> Config {
    let mut config = Config::default();
    config.store.sweep_interval_secs = 0;
    config.reconnect.jitter_fraction = 0.0;
    config.cache.insert("quotes".to_string(), CacheConfig::default());
    config
}
