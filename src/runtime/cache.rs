//! TTL result cache with efficiency accounting.
//!
//! Values are stored as JSON under a per-cache namespace
//! (`<prefix>cache:<name>:`) in the shared [`KeyStore`]. The cache fails
//! soft: store errors and timeouts are logged and behave like a miss (reads)
//! or a skipped write, never an error for the caller.
//!
//! `evictions` counts entries removed for expiry (seen on read or by
//! [`ResultCache::purge_expired`]), by [`ResultCache::clear_pattern`]
//! (expired leftovers included), and by capacity trimming. Explicit
//! single-key [`ResultCache::delete`] is not an eviction.
//!
//! On a backend that expires keys itself (Redis) an expired entry is gone
//! before the cache can see it. Such reads count as plain misses and never as
//! evictions. Those backends also cannot bound entry counts, so
//! [`ResultCache::with_config`] rejects `max_entries` for them.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::bounded;
use super::throttle::DEFAULT_OP_TIMEOUT;
use crate::domain::CacheStats;
use crate::error::{ConfigError, StoreError};
use crate::infrastructure::config::throttle::validate_name;
use crate::infrastructure::config::CacheConfig;
use crate::port::{KeyStore, Lookup};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Named result cache.
///
/// Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct ResultCache {
    name: Arc<str>,
    namespace: String,
    store: Arc<dyn KeyStore>,
    op_timeout: Duration,
    default_ttl: Option<Duration>,
    max_entries: Option<usize>,
    counters: Arc<Counters>,
}

impl ResultCache {
    /// Cache whose keys live under `cache:<name>:`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `name` is not a plain name.
    pub fn new(name: &str, store: Arc<dyn KeyStore>) -> Result<Self, ConfigError> {
        validate_name(name).map_err(|_| {
            ConfigError::invalid(
                "cache",
                format!("cache name '{name}' must use letters, digits, '-' or '_'"),
            )
        })?;
        Ok(Self {
            name: Arc::from(name),
            namespace: format!("cache:{name}:"),
            store,
            op_timeout: DEFAULT_OP_TIMEOUT,
            default_ttl: None,
            max_entries: None,
            counters: Arc::new(Counters::default()),
        })
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.namespace = format!("{prefix}cache:{}:", self.name);
        self
    }

    #[must_use]
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Apply a `[cache.<name>]` table (default TTL and capacity).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an invalid table, or when
    /// `max_entries` is set but the backing store cannot enforce it.
    pub fn with_config(mut self, config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.max_entries.is_some() && !self.store.enforces_capacity() {
            return Err(ConfigError::invalid(
                "max_entries",
                format!(
                    "the {} backend cannot bound cache '{}'",
                    self.store.backend_name(),
                    self.name
                ),
            ));
        }
        self.default_ttl = config.default_ttl();
        self.max_entries = config.max_entries;
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix shared by every key of this cache in the backing store.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    fn namespace_pattern(&self) -> String {
        format!("{}*", self.namespace)
    }

    fn soft_fail(&self, operation: &str, key: &str, err: &StoreError) {
        warn!(
            cache = %self.name,
            key,
            operation,
            error = %err,
            "Cache store call failed, continuing without cache"
        );
    }

    fn count_evictions(&self, n: u64) {
        if n > 0 {
            self.counters.evictions.fetch_add(n, Ordering::Relaxed);
        }
    }

    fn miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Stored value for `key`, if present, unexpired and decodable as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Option<T> {
        let key = key.as_ref();
        let full = self.full_key(key);
        let lookup = match bounded(self.op_timeout, self.store.get(&full)).await {
            Ok(lookup) => lookup,
            Err(e) => {
                self.soft_fail("get", key, &e);
                self.miss();
                return None;
            }
        };

        match lookup {
            Lookup::Hit(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    Some(value)
                }
                Err(e) => {
                    self.soft_fail("decode", key, &StoreError::Codec(e));
                    self.miss();
                    None
                }
            },
            Lookup::Expired => {
                self.count_evictions(1);
                self.miss();
                None
            }
            Lookup::Missing => {
                self.miss();
                None
            }
        }
    }

    /// Store `value` under `key`.
    ///
    /// Without `ttl` the cache's default TTL applies; without either the
    /// entry never expires. Returns whether the value was stored.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: impl AsRef<str>,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let key = key.as_ref();
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.soft_fail("encode", key, &StoreError::Codec(e));
                return false;
            }
        };
        let ttl = ttl.or(self.default_ttl);
        let full = self.full_key(key);
        let stored = bounded(self.op_timeout, self.store.set(&full, bytes, ttl)).await;
        if let Err(e) = stored {
            self.soft_fail("set", key, &e);
            return false;
        }
        if let Some(max_entries) = self.max_entries {
            self.trim(max_entries).await;
        }
        true
    }

    async fn trim(&self, max_entries: usize) {
        let pattern = self.namespace_pattern();
        let trimmed = bounded(
            self.op_timeout,
            self.store.trim_matching(&pattern, max_entries),
        )
        .await;
        match trimmed {
            Ok(trimmed) => {
                if trimmed > 0 {
                    debug!(cache = %self.name, trimmed, max_entries, "Cache trimmed to capacity");
                }
                self.count_evictions(trimmed);
            }
            Err(e) => self.soft_fail("trim", &pattern, &e),
        }
    }

    /// Remove `key`. Returns whether a live entry was removed.
    pub async fn delete(&self, key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        match bounded(self.op_timeout, self.store.delete(&self.full_key(key))).await {
            Ok(removed) => removed,
            Err(e) => {
                self.soft_fail("delete", key, &e);
                false
            }
        }
    }

    pub async fn exists(&self, key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        match bounded(self.op_timeout, self.store.exists(&self.full_key(key))).await {
            Ok(found) => found,
            Err(e) => {
                self.soft_fail("exists", key, &e);
                false
            }
        }
    }

    /// Set or overwrite the expiry of an existing entry.
    pub async fn expire(&self, key: impl AsRef<str>, ttl: Duration) -> bool {
        let key = key.as_ref();
        match bounded(self.op_timeout, self.store.expire(&self.full_key(key), ttl)).await {
            Ok(set) => set,
            Err(e) => {
                self.soft_fail("expire", key, &e);
                false
            }
        }
    }

    /// Remaining lifetime of `key`.
    ///
    /// `None` when the key is absent, has no expiry, or the store failed.
    pub async fn ttl(&self, key: impl AsRef<str>) -> Option<Duration> {
        let key = key.as_ref();
        match bounded(self.op_timeout, self.store.ttl(&self.full_key(key))).await {
            Ok(ttl) => ttl.remaining(),
            Err(e) => {
                self.soft_fail("ttl", key, &e);
                None
            }
        }
    }

    /// Delete every key of this cache matching the glob `pattern`.
    ///
    /// `pattern` is relative to the cache namespace (`"user:*"`). Returns the
    /// number of live entries removed; expired leftovers it sweeps up are
    /// counted as evictions too.
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        let full = self.full_key(pattern);
        match bounded(self.op_timeout, self.store.delete_matching(&full)).await {
            Ok(removal) => {
                debug!(
                    cache = %self.name,
                    pattern,
                    removed = removal.live,
                    expired = removal.expired,
                    "Cache entries cleared"
                );
                self.count_evictions(removal.live + removal.expired);
                removal.live
            }
            Err(e) => {
                self.soft_fail("clear_pattern", pattern, &e);
                0
            }
        }
    }

    /// Add `amount` to the integer at `key`, creating it at 0 first.
    ///
    /// `None` if the store failed or the existing value is not an integer.
    pub async fn increment(&self, key: impl AsRef<str>, amount: i64) -> Option<i64> {
        let key = key.as_ref();
        let full = self.full_key(key);
        match bounded(self.op_timeout, self.store.incr_by(&full, amount)).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.soft_fail("increment", key, &e);
                None
            }
        }
    }

    pub async fn decrement(&self, key: impl AsRef<str>, amount: i64) -> Option<i64> {
        self.increment(key, amount.wrapping_neg()).await
    }

    /// Cached value for `key`, computing and storing it on a miss.
    ///
    /// Concurrent callers missing on the same key may each run `factory`;
    /// the last write wins.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: impl AsRef<str>,
        factory: F,
        ttl: Option<Duration>,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = key.as_ref();
        if let Some(cached) = self.get(key).await {
            return cached;
        }
        let value = factory().await;
        self.set(key, &value, ttl).await;
        value
    }

    /// [`get_or_set`](Self::get_or_set) for fallible factories.
    ///
    /// Errors are returned to the caller and nothing is cached.
    pub async fn try_get_or_set<T, E, F, Fut>(
        &self,
        key: impl AsRef<str>,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.as_ref();
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }
        let value = factory().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Eagerly remove expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> u64 {
        let pattern = self.namespace_pattern();
        match bounded(self.op_timeout, self.store.purge_expired(&pattern)).await {
            Ok(purged) => {
                self.count_evictions(purged);
                purged
            }
            Err(e) => {
                self.soft_fail("purge_expired", &pattern, &e);
                0
            }
        }
    }

    /// Counters plus the current number of live entries.
    pub async fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let pattern = self.namespace_pattern();
        let size = match bounded(self.op_timeout, self.store.count_matching(&pattern)).await {
            Ok(size) => size,
            Err(e) => {
                self.soft_fail("size", &pattern, &e);
                0
            }
        };
        CacheStats {
            hits,
            misses,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            size,
            hit_rate: CacheStats::compute_hit_rate(hits, misses),
        }
    }
}
