//! Backing key/counter store port.
//!
//! One store is shared by every throttle and cache instance; callers keep
//! their state apart with disjoint key prefixes. Multi-step operations
//! (`window_admit`, `incr_by`) must be atomic per key in the store itself,
//! since callers may live in different processes.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Result of a point read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(Vec<u8>),
    /// The entry existed but its TTL had passed; the read removed it.
    Expired,
    Missing,
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    /// Present without an expiry.
    Persistent,
    Expires(Duration),
}

impl KeyTtl {
    /// Remaining lifetime, or `None` when absent or persistent.
    #[must_use]
    pub const fn remaining(self) -> Option<Duration> {
        match self {
            Self::Expires(d) => Some(d),
            Self::Missing | Self::Persistent => None,
        }
    }
}

/// Keys removed by a pattern delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    /// Keys that were still live.
    pub live: u64,
    /// Keys whose TTL had already passed but were still held by the store.
    pub expired: u64,
}

/// Outcome of one sliding-window purge/count/insert step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAdmission {
    pub admitted: bool,
    /// Entries in the window after purging, before this admission was recorded.
    pub count: u32,
}

/// Shared key/value and counter store.
///
/// Patterns use glob syntax (`*`, `?`, `[...]`).
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Short backend label for logs ("memory", "redis").
    fn backend_name(&self) -> &'static str;

    /// Whether [`trim_matching`](Self::trim_matching) bounds the number of keys.
    fn enforces_capacity(&self) -> bool {
        true
    }

    async fn ping(&self) -> StoreResult<()>;

    /// Read a value. Expired entries are removed and reported as [`Lookup::Expired`].
    async fn get(&self, key: &str) -> StoreResult<Lookup>;

    /// Store a value, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Set or overwrite the expiry of an existing key. Returns `false` if absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// Delete every key matching `pattern`, counting live and expired keys apart.
    async fn delete_matching(&self, pattern: &str) -> StoreResult<Removal>;

    /// Count live keys matching `pattern`.
    async fn count_matching(&self, pattern: &str) -> StoreResult<u64>;

    /// Atomically add `delta` to an integer value, creating it at zero.
    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// Remove expired entries matching `pattern`, returning how many were removed.
    async fn purge_expired(&self, pattern: &str) -> StoreResult<u64>;

    /// Drop the oldest live entries matching `pattern` until at most
    /// `max_entries` remain. Returns how many were dropped.
    ///
    /// Backends whose [`enforces_capacity`](Self::enforces_capacity) is
    /// `false` return [`StoreError::Unsupported`](crate::error::StoreError::Unsupported).
    async fn trim_matching(&self, pattern: &str, max_entries: usize) -> StoreResult<u64>;

    /// Drop sliding windows matching `pattern` that hold no entry inside
    /// their window any more. Returns how many were dropped.
    async fn purge_idle_windows(&self, pattern: &str) -> StoreResult<u64>;

    /// Atomically: purge window entries older than `window`, count the rest,
    /// and record a new entry only if the count is below `max_requests`.
    async fn window_admit(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> StoreResult<WindowAdmission>;

    /// Entries currently inside the window, without recording one.
    async fn window_count(&self, key: &str, window: Duration) -> StoreResult<u32>;
}
