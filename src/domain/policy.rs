//! Reconnection policy and backoff math.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::error::ConfigError;

/// Immutable retry policy for the reconnection supervisor.
///
/// Delays grow exponentially with the retry count, are capped at
/// `max_delay`, then perturbed by a multiplicative jitter in
/// `[1 - jitter_fraction, 1 + jitter_fraction]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconnectPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter_fraction: f64,
}

impl ReconnectPolicy {
    /// Build a validated policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when:
    /// - `backoff_factor` is not finite or below 1.0
    /// - `jitter_fraction` is outside `[0, 1)`
    /// - `initial_delay` exceeds `max_delay`
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_factor: f64,
        jitter_fraction: f64,
    ) -> Result<Self, ConfigError> {
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(ConfigError::invalid("backoff_factor", "must be a finite value >= 1.0"));
        }
        if !(0.0..1.0).contains(&jitter_fraction) {
            return Err(ConfigError::invalid("jitter_fraction", "must be in [0, 1)"));
        }
        if initial_delay > max_delay {
            return Err(ConfigError::invalid("initial_delay_ms", "must be <= max_delay_ms"));
        }
        Ok(Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_factor,
            jitter_fraction,
        })
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    #[must_use]
    pub const fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    #[must_use]
    pub const fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    /// Pre-jitter delay before the attempt made at `retry_count`.
    ///
    /// `min(initial_delay * backoff_factor^retry_count, max_delay)`.
    #[must_use]
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Delay before the attempt made at `retry_count`, jitter applied.
    pub fn delay<R: Rng>(&self, retry_count: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(retry_count);
        if self.jitter_fraction == 0.0 || base.is_zero() {
            return base;
        }
        let factor = 1.0 + rng.gen_range(-self.jitter_fraction..=self.jitter_fraction);
        base.mul_f64(factor)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter_fraction: 0.1,
        }
    }
}
