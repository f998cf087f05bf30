//! Performance sample retention configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// `[observability]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ObservabilityConfig {
    /// Samples kept per operation name; the oldest is dropped beyond this.
    #[serde(default = "default_max_samples")]
    pub max_samples_per_operation: usize,
    /// Samples older than this are dropped when reading or recording.
    #[serde(default)]
    pub max_sample_age_secs: Option<u64>,
}

fn default_max_samples() -> usize {
    1000
}

impl ObservabilityConfig {
    #[must_use]
    pub fn max_sample_age(&self) -> Option<Duration> {
        self.max_sample_age_secs.map(Duration::from_secs)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_samples_per_operation == 0 {
            return Err(ConfigError::invalid(
                "max_samples_per_operation",
                "must be greater than 0",
            ));
        }
        if self.max_sample_age_secs == Some(0) {
            return Err(ConfigError::invalid("max_sample_age_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            max_samples_per_operation: default_max_samples(),
            max_sample_age_secs: None,
        }
    }
}
