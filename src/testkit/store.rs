//! Backing stores that misbehave, for fail-open and fail-soft tests, plus an
//! in-process stand-in for a store that cannot bound capacity.

use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::outbound::MemoryStore;
use crate::error::{StoreError, StoreResult};
use crate::port::{KeyStore, KeyTtl, Lookup, Removal, WindowAdmission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Fail,
    Hang,
}

/// A [`KeyStore`] where every call errors or never completes.
#[derive(Debug, Clone, Copy)]
pub struct BrokenStore {
    mode: Mode,
}

impl BrokenStore {
    /// Every call returns [`StoreError::Unavailable`].
    pub fn failing() -> Self {
        Self { mode: Mode::Fail }
    }

    /// Every call hangs until the caller's timeout fires.
    pub fn hanging() -> Self {
        Self { mode: Mode::Hang }
    }

    async fn broken<T>(&self) -> StoreResult<T> {
        if self.mode == Mode::Hang {
            std::future::pending::<()>().await;
        }
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl KeyStore for BrokenStore {
    fn backend_name(&self) -> &'static str {
        "broken"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.broken().await
    }

    async fn get(&self, _key: &str) -> StoreResult<Lookup> {
        self.broken().await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> StoreResult<()> {
        self.broken().await
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        self.broken().await
    }

    async fn exists(&self, _key: &str) -> StoreResult<bool> {
        self.broken().await
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> StoreResult<bool> {
        self.broken().await
    }

    async fn ttl(&self, _key: &str) -> StoreResult<KeyTtl> {
        self.broken().await
    }

    async fn delete_matching(&self, _pattern: &str) -> StoreResult<Removal> {
        self.broken().await
    }

    async fn count_matching(&self, _pattern: &str) -> StoreResult<u64> {
        self.broken().await
    }

    async fn incr_by(&self, _key: &str, _delta: i64) -> StoreResult<i64> {
        self.broken().await
    }

    async fn purge_expired(&self, _pattern: &str) -> StoreResult<u64> {
        self.broken().await
    }

    async fn trim_matching(&self, _pattern: &str, _max_entries: usize) -> StoreResult<u64> {
        self.broken().await
    }

    async fn purge_idle_windows(&self, _pattern: &str) -> StoreResult<u64> {
        self.broken().await
    }

    async fn window_admit(
        &self,
        _key: &str,
        _window: Duration,
        _max_requests: u32,
    ) -> StoreResult<WindowAdmission> {
        self.broken().await
    }

    async fn window_count(&self, _key: &str, _window: Duration) -> StoreResult<u32> {
        self.broken().await
    }
}

/// In-process store that, like the redis backend, cannot trim to a capacity.
///
/// Everything else is delegated to a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct UnboundedStore {
    inner: MemoryStore,
}

impl UnboundedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for UnboundedStore {
    fn backend_name(&self) -> &'static str {
        "unbounded"
    }

    fn enforces_capacity(&self) -> bool {
        false
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> StoreResult<Lookup> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        self.inner.ttl(key).await
    }

    async fn delete_matching(&self, pattern: &str) -> StoreResult<Removal> {
        self.inner.delete_matching(pattern).await
    }

    async fn count_matching(&self, pattern: &str) -> StoreResult<u64> {
        self.inner.count_matching(pattern).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.inner.incr_by(key, delta).await
    }

    async fn purge_expired(&self, pattern: &str) -> StoreResult<u64> {
        self.inner.purge_expired(pattern).await
    }

    async fn trim_matching(&self, _pattern: &str, _max_entries: usize) -> StoreResult<u64> {
        Err(StoreError::Unsupported("capacity trimming"))
    }

    async fn purge_idle_windows(&self, pattern: &str) -> StoreResult<u64> {
        self.inner.purge_idle_windows(pattern).await
    }

    async fn window_admit(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> StoreResult<WindowAdmission> {
        self.inner.window_admit(key, window, max_requests).await
    }

    async fn window_count(&self, key: &str, window: Duration) -> StoreResult<u32> {
        self.inner.window_count(key, window).await
    }
}
