//! Sliding-window throttle limits, presets, and admission decisions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ConfigError;

/// Admission budget: at most `max_requests` within any trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleLimit {
    max_requests: u32,
    window: Duration,
}

impl ThrottleLimit {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `max_requests` or `window` is zero.
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::invalid("max_requests", "must be > 0"));
        }
        if window.is_zero() {
            return Err(ConfigError::invalid("window_secs", "must be > 0"));
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    #[must_use]
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Upper bound on when a window observed at `now` has fully drained.
    #[must_use]
    pub fn reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Named throttle policies shipped with the crate.
///
/// Each preset gets its own key namespace, so unrelated call sites never
/// share counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThrottlePreset {
    /// Order placement and other privileged actions.
    Strict,
    Moderate,
    /// Read-only market data.
    Lenient,
    /// Inbound exchange webhooks.
    Webhook,
    /// Login and two-factor attempts.
    Auth,
}

impl ThrottlePreset {
    pub const ALL: [Self; 5] = [
        Self::Strict,
        Self::Moderate,
        Self::Lenient,
        Self::Webhook,
        Self::Auth,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Moderate => "moderate",
            Self::Lenient => "lenient",
            Self::Webhook => "webhook",
            Self::Auth => "auth",
        }
    }

    /// `(max_requests, window_secs)` used when config does not override it.
    #[must_use]
    pub const fn default_budget(self) -> (u32, u64) {
        match self {
            Self::Strict => (10, 60),
            Self::Moderate => (100, 60),
            Self::Lenient => (1000, 60),
            Self::Webhook => (300, 60),
            Self::Auth => (5, 300),
        }
    }
}

impl fmt::Display for ThrottlePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThrottlePreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::invalid("throttle preset", format!("unknown preset '{s}'")))
    }
}

/// Outcome of a throttle check, suitable for rate-limit response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrottleDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Upper bound on when the budget is fully restored (`now + window`).
    pub reset_at: DateTime<Utc>,
    /// True when the backing store failed and the request was admitted anyway.
    pub degraded: bool,
}

impl ThrottleDecision {
    /// Seconds a rejected caller should wait before retrying.
    #[must_use]
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.allowed {
            return None;
        }
        let secs = (self.reset_at - now).num_seconds().max(0);
        Some(Duration::from_secs(secs.unsigned_abs()))
    }

    /// Standard `X-RateLimit-*` headers, plus `Retry-After` when rejected.
    #[must_use]
    pub fn headers(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at.timestamp().to_string()),
        ];
        if let Some(wait) = self.retry_after(now) {
            headers.push(("Retry-After", wait.as_secs().to_string()));
        }
        headers
    }
}
