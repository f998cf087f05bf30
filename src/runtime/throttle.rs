//! Sliding-window throttling.
//!
//! A [`ThrottleWindow`] admits at most `max_requests` per `(identifier,
//! endpoint)` within any trailing window. Purge, count, and insert run as one
//! atomic step inside the backing store, so concurrent callers (in this
//! process or others sharing the store) cannot over-admit.
//!
//! Keys are `<prefix>throttle:<preset>:<identifier>:<endpoint>` with the
//! identifier and endpoint escaped like [`CacheKey`](crate::domain::CacheKey)
//! components, so no two distinct pairs share a counter.
//!
//! Throttling fails open: when the store errors or times out the request is
//! admitted, the decision is flagged `degraded`, and a warning is logged.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::bounded;
use crate::domain::cache_key::escape_into;
use crate::domain::{ThrottleDecision, ThrottleLimit, ThrottlePreset};
use crate::error::{ConfigError, StoreError};
use crate::infrastructure::config::throttle::validate_name;
use crate::infrastructure::config::{StoreConfig, ThrottleConfig};
use crate::port::KeyStore;

/// Default bound on a single store call.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

/// Sliding-window limiter for one preset.
#[derive(Clone)]
pub struct ThrottleWindow {
    preset: Arc<str>,
    namespace: String,
    limit: ThrottleLimit,
    store: Arc<dyn KeyStore>,
    op_timeout: Duration,
}

impl ThrottleWindow {
    /// Limiter whose keys live under `throttle:<preset>`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `preset` is not a plain name.
    pub fn new(
        preset: &str,
        limit: ThrottleLimit,
        store: Arc<dyn KeyStore>,
    ) -> Result<Self, ConfigError> {
        validate_name(preset)?;
        Ok(Self {
            preset: Arc::from(preset),
            namespace: format!("throttle:{preset}"),
            limit,
            store,
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    /// Prefix every key, e.g. to share one store between deployments.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.namespace = format!("{prefix}throttle:{}", self.preset);
        self
    }

    #[must_use]
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    #[must_use]
    pub fn preset(&self) -> &str {
        &self.preset
    }

    #[must_use]
    pub const fn limit(&self) -> ThrottleLimit {
        self.limit
    }

    fn key(&self, identifier: &str, endpoint: &str) -> String {
        let mut key =
            String::with_capacity(self.namespace.len() + identifier.len() + endpoint.len() + 2);
        key.push_str(&self.namespace);
        key.push(':');
        escape_into(&mut key, identifier);
        key.push(':');
        escape_into(&mut key, endpoint);
        key
    }

    fn fail_open(&self, operation: &str, key: &str, err: &StoreError) -> ThrottleDecision {
        warn!(
            preset = %self.preset,
            key,
            operation,
            error = %err,
            "Throttle store unavailable, admitting request"
        );
        let now = Utc::now();
        ThrottleDecision {
            allowed: true,
            limit: self.limit.max_requests(),
            remaining: self.limit.max_requests(),
            reset_at: self.limit.reset_at(now),
            degraded: true,
        }
    }

    /// Admit or reject one request, recording it when admitted.
    pub async fn check(&self, identifier: &str, endpoint: &str) -> ThrottleDecision {
        let key = self.key(identifier, endpoint);
        let max_requests = self.limit.max_requests();
        let admission = bounded(
            self.op_timeout,
            self.store
                .window_admit(&key, self.limit.window(), max_requests),
        )
        .await;

        match admission {
            Ok(admission) => {
                let remaining = if admission.admitted {
                    max_requests.saturating_sub(admission.count + 1)
                } else {
                    debug!(
                        preset = %self.preset,
                        key = %key,
                        count = admission.count,
                        "Request throttled"
                    );
                    0
                };
                ThrottleDecision {
                    allowed: admission.admitted,
                    limit: max_requests,
                    remaining,
                    reset_at: self.limit.reset_at(Utc::now()),
                    degraded: false,
                }
            }
            Err(e) => self.fail_open("check", &key, &e),
        }
    }

    /// Budget left for `(identifier, endpoint)` without recording a request.
    pub async fn peek(&self, identifier: &str, endpoint: &str) -> ThrottleDecision {
        let key = self.key(identifier, endpoint);
        let max_requests = self.limit.max_requests();
        match bounded(
            self.op_timeout,
            self.store.window_count(&key, self.limit.window()),
        )
        .await
        {
            Ok(count) => ThrottleDecision {
                allowed: count < max_requests,
                limit: max_requests,
                remaining: max_requests.saturating_sub(count),
                reset_at: self.limit.reset_at(Utc::now()),
                degraded: false,
            },
            Err(e) => self.fail_open("peek", &key, &e),
        }
    }

    /// Forget every recorded request for `(identifier, endpoint)`.
    ///
    /// Returns whether anything was cleared; store failures are logged and
    /// reported as `false`.
    pub async fn reset(&self, identifier: &str, endpoint: &str) -> bool {
        let key = self.key(identifier, endpoint);
        match bounded(self.op_timeout, self.store.delete(&key)).await {
            Ok(cleared) => {
                debug!(preset = %self.preset, key = %key, cleared, "Throttle reset");
                cleared
            }
            Err(e) => {
                warn!(preset = %self.preset, key = %key, error = %e, "Throttle reset failed");
                false
            }
        }
    }

    /// Drop the windows of `(identifier, endpoint)` pairs that have gone
    /// quiet. Returns how many were dropped.
    pub async fn purge_idle(&self) -> u64 {
        let pattern = format!("{}:*", self.namespace);
        match bounded(self.op_timeout, self.store.purge_idle_windows(&pattern)).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(preset = %self.preset, error = %e, "Idle throttle window purge failed");
                0
            }
        }
    }
}

/// Every configured preset, each with its own [`ThrottleWindow`].
#[derive(Clone, Default)]
pub struct Throttles {
    windows: BTreeMap<String, ThrottleWindow>,
}

impl Throttles {
    /// Build one window per preset in `config` (built-ins included).
    pub fn build(
        config: &ThrottleConfig,
        store_config: &StoreConfig,
        store: &Arc<dyn KeyStore>,
    ) -> Result<Self, ConfigError> {
        let mut windows = BTreeMap::new();
        for (name, limit) in config.limits()? {
            let window = ThrottleWindow::new(&name, limit, Arc::clone(store))?
                .with_key_prefix(&store_config.key_prefix)
                .with_op_timeout(store_config.op_timeout());
            windows.insert(name, window);
        }
        Ok(Self { windows })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ThrottleWindow> {
        self.windows.get(name)
    }

    #[must_use]
    pub fn preset(&self, preset: ThrottlePreset) -> Option<&ThrottleWindow> {
        self.get(preset.name())
    }

    /// Every window, in preset-name order.
    pub fn windows(&self) -> impl Iterator<Item = &ThrottleWindow> {
        self.windows.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
