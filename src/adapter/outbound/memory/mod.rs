//! In-process backing store.
//!
//! Keys live in sharded maps, so every per-key multi-step operation runs
//! under that key's shard lock and cannot interleave with another caller.
//! Time comes from `tokio::time`, which lets tests drive expiry with a
//! paused clock.
//!
//! A sliding window whose entries have all aged out is dropped on the next
//! count or by [`KeyStore::purge_idle_windows`], so identifiers that go quiet
//! do not hold memory.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use glob::Pattern;
use tokio::time::Instant;

use crate::error::{StoreError, StoreResult};
use crate::port::{KeyStore, KeyTtl, Lookup, Removal, WindowAdmission};

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    /// Insertion order, used to pick victims when trimming.
    seq: u64,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Admission timestamps of one sliding window, oldest first.
#[derive(Debug)]
struct WindowLog {
    /// Length of the window most recently applied to this log.
    window: Duration,
    hits: VecDeque<Instant>,
}

impl WindowLog {
    fn new(window: Duration) -> Self {
        Self {
            window,
            hits: VecDeque::new(),
        }
    }

    /// Drop timestamps at or before `now - window`.
    fn purge(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.hits.front().is_some_and(|t| *t <= cutoff) {
            self.hits.pop_front();
        }
    }

    fn count(&self) -> u32 {
        u32::try_from(self.hits.len()).unwrap_or(u32::MAX)
    }
}

/// Single-process [`KeyStore`] backed by [`DashMap`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    windows: DashMap<String, WindowLog>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn compile(pattern: &str) -> StoreResult<Pattern> {
        Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })
    }

    /// Remove `key`'s window if it is still empty once the shard lock is retaken.
    fn drop_if_idle(&self, key: &str) {
        self.windows.remove_if(key, |_, log| log.hits.is_empty());
    }

    fn parse_integer(key: &str, raw: &[u8]) -> StoreResult<i64> {
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| StoreError::NotAnInteger {
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Lookup> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(slot) if slot.get().is_expired(now) => {
                slot.remove();
                Ok(Lookup::Expired)
            }
            Entry::Occupied(slot) => Ok(Lookup::Hit(slot.get().value.clone())),
            Entry::Vacant(_) => Ok(Lookup::Missing),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let slot = Slot {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
            seq: self.next_seq(),
        };
        self.entries.insert(key.to_string(), slot);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let removed_entry = self
            .entries
            .remove(key)
            .is_some_and(|(_, slot)| !slot.is_expired(now));
        let removed_window = self.windows.remove(key).is_some();
        Ok(removed_entry || removed_window)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|slot| !slot.is_expired(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(slot) if slot.get().is_expired(now) => {
                slot.remove();
                Ok(false)
            }
            Entry::Occupied(mut slot) => {
                slot.get_mut().expires_at = Some(now + ttl);
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let now = Instant::now();
        Ok(match self.entries.get(key) {
            None => KeyTtl::Missing,
            Some(slot) => match slot.expires_at {
                None => KeyTtl::Persistent,
                Some(at) if at <= now => KeyTtl::Missing,
                Some(at) => KeyTtl::Expires(at - now),
            },
        })
    }

    async fn delete_matching(&self, pattern: &str) -> StoreResult<Removal> {
        let pattern = Self::compile(pattern)?;
        let now = Instant::now();
        let mut removal = Removal::default();
        self.entries.retain(|key, slot| {
            if !pattern.matches(key) {
                return true;
            }
            if slot.is_expired(now) {
                removal.expired += 1;
            } else {
                removal.live += 1;
            }
            false
        });
        self.windows.retain(|key, _| !pattern.matches(key));
        Ok(removal)
    }

    async fn count_matching(&self, pattern: &str) -> StoreResult<u64> {
        let pattern = Self::compile(pattern)?;
        let now = Instant::now();
        let count = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now) && pattern.matches(e.key()))
            .count();
        Ok(count as u64)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let now = Instant::now();
        let seq = self.next_seq();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let current = if slot.get().is_expired(now) {
                    slot.get_mut().expires_at = None;
                    0
                } else {
                    Self::parse_integer(key, &slot.get().value)?
                };
                let next = current.wrapping_add(delta);
                slot.get_mut().value = next.to_string().into_bytes();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: delta.to_string().into_bytes(),
                    expires_at: None,
                    seq,
                });
                Ok(delta)
            }
        }
    }

    async fn purge_expired(&self, pattern: &str) -> StoreResult<u64> {
        let pattern = Self::compile(pattern)?;
        let now = Instant::now();
        let mut removed = 0u64;
        self.entries.retain(|key, slot| {
            if slot.is_expired(now) && pattern.matches(key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn trim_matching(&self, pattern: &str, max_entries: usize) -> StoreResult<u64> {
        let pattern = Self::compile(pattern)?;
        let now = Instant::now();
        let mut live: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now) && pattern.matches(e.key()))
            .map(|e| (e.value().seq, e.key().clone()))
            .collect();
        if live.len() <= max_entries {
            return Ok(0);
        }

        live.sort_unstable_by_key(|(seq, _)| *seq);
        let excess = live.len() - max_entries;
        let mut removed = 0u64;
        for (seq, key) in live.into_iter().take(excess) {
            // A concurrent set replaced the entry; leave the fresh value alone.
            if self.entries.remove_if(&key, |_, slot| slot.seq == seq).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn purge_idle_windows(&self, pattern: &str) -> StoreResult<u64> {
        let pattern = Self::compile(pattern)?;
        let now = Instant::now();
        let mut removed = 0u64;
        self.windows.retain(|key, log| {
            if !pattern.matches(key) {
                return true;
            }
            log.purge(now);
            if log.hits.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn window_admit(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> StoreResult<WindowAdmission> {
        let now = Instant::now();
        let admission = {
            let mut log = self
                .windows
                .entry(key.to_string())
                .or_insert_with(|| WindowLog::new(window));
            log.window = window;
            log.purge(now);

            let count = log.count();
            let admitted = count < max_requests;
            if admitted {
                log.hits.push_back(now);
            }
            WindowAdmission { admitted, count }
        };
        if !admission.admitted {
            self.drop_if_idle(key);
        }
        Ok(admission)
    }

    async fn window_count(&self, key: &str, window: Duration) -> StoreResult<u32> {
        let now = Instant::now();
        let count = {
            let Some(mut log) = self.windows.get_mut(key) else {
                return Ok(0);
            };
            log.window = window;
            log.purge(now);
            log.count()
        };
        if count == 0 {
            self.drop_if_idle(key);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests;
