//! Throttle preset configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{ThrottleLimit, ThrottlePreset};
use crate::error::ConfigError;

/// Budget for one named preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThrottlePresetConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// `[throttle.presets.<name>]` tables.
///
/// Built-in presets (`strict`, `moderate`, `lenient`, `webhook`, `auth`) are
/// always present; a table with the same name overrides the built-in budget,
/// any other name adds a custom preset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub presets: BTreeMap<String, ThrottlePresetConfig>,
}

impl ThrottleConfig {
    /// Resolve every preset (built-in and custom) into a validated limit.
    pub fn limits(&self) -> Result<BTreeMap<String, ThrottleLimit>, ConfigError> {
        let mut limits = BTreeMap::new();
        for preset in ThrottlePreset::ALL {
            let (max_requests, window_secs) = preset.default_budget();
            limits.insert(
                preset.name().to_string(),
                ThrottleLimit::new(max_requests, Duration::from_secs(window_secs))?,
            );
        }
        for (name, preset) in &self.presets {
            validate_name(name)?;
            limits.insert(
                name.clone(),
                ThrottleLimit::new(preset.max_requests, Duration::from_secs(preset.window_secs))?,
            );
        }
        Ok(limits)
    }
}

/// Preset names become key namespace segments.
pub(crate) fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::invalid("presets", "preset name must not be empty"));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
        return Err(ConfigError::invalid(
            "presets",
            format!("preset name '{name}' contains '{c}'; use letters, digits, '-' or '_'"),
        ));
    }
    Ok(())
}
