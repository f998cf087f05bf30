//! Redis-backed store shared across processes.
//!
//! Sliding windows are sorted sets scored by epoch milliseconds. Admission
//! runs as a server-side script so purge, count, and conditional insert are
//! one atomic step no matter how many processes share the server.
//!
//! Expiry belongs to the server: expired values simply vanish, so reads never
//! report [`Lookup::Expired`] and nothing is left to purge. Capacity trimming
//! is not offered; `[cache.<name>] max_entries` is rejected for this backend
//! and the server's `maxmemory-policy` bounds memory instead.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::port::{KeyStore, KeyTtl, Lookup, Removal, WindowAdmission};

const SCAN_BATCH: usize = 500;

const WINDOW_ADMIT_SCRIPT: &str = r"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now - window)
local count = redis.call('ZCARD', KEYS[1])
if count < limit then
  redis.call('ZADD', KEYS[1], now, ARGV[4])
  redis.call('PEXPIRE', KEYS[1], window)
  return {1, count}
end
return {0, count}
";

/// [`KeyStore`] over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    admit: Script,
}

impl RedisStore {
    /// Open a managed connection to `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to redis backing store");
        Ok(Self {
            conn,
            admit: Script::new(WINDOW_ADMIT_SCRIPT),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    fn millis(d: Duration) -> u64 {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
    }

    /// Walk the keyspace with SCAN, handing each batch of matches to `visit`.
    async fn scan<F>(&self, pattern: &str, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(Vec<String>) + Send,
    {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            visit(keys);
            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}

#[async_trait]
impl KeyStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn enforces_capacity(&self) -> bool {
        false
    }

    async fn ping(&self) -> StoreResult<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Lookup> {
        let raw: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn())
            .await?;
        Ok(raw.map_or(Lookup::Missing, Lookup::Hit))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(Self::millis(ttl));
        }
        let _: () = cmd.query_async(&mut self.conn()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut self.conn()).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let found: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut self.conn()).await?;
        Ok(found > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let set: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(Self::millis(ttl))
            .query_async(&mut self.conn())
            .await?;
        Ok(set == 1)
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let ms: i64 = redis::cmd("PTTL").arg(key).query_async(&mut self.conn()).await?;
        Ok(match ms {
            -1 => KeyTtl::Persistent,
            ms if ms < 0 => KeyTtl::Missing,
            ms => KeyTtl::Expires(Duration::from_millis(ms.unsigned_abs())),
        })
    }

    async fn delete_matching(&self, pattern: &str) -> StoreResult<Removal> {
        let mut conn = self.conn();
        let mut batches = Vec::new();
        self.scan(pattern, |keys| {
            if !keys.is_empty() {
                batches.push(keys);
            }
        })
        .await?;

        let mut removed = 0u64;
        for keys in batches {
            let n: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
            removed += n;
        }
        Ok(Removal {
            live: removed,
            expired: 0,
        })
    }

    async fn count_matching(&self, pattern: &str) -> StoreResult<u64> {
        let mut count = 0u64;
        self.scan(pattern, |keys| count += keys.len() as u64).await?;
        Ok(count)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut self.conn())
            .await?;
        Ok(value)
    }

    /// The server drops expired keys itself, so none are ever left behind.
    async fn purge_expired(&self, _pattern: &str) -> StoreResult<u64> {
        Ok(0)
    }

    async fn trim_matching(&self, _pattern: &str, _max_entries: usize) -> StoreResult<u64> {
        Err(StoreError::Unsupported("capacity trimming"))
    }

    /// Every admission refreshes the window key's `PEXPIRE`, so idle windows
    /// expire on the server.
    async fn purge_idle_windows(&self, _pattern: &str) -> StoreResult<u64> {
        Ok(0)
    }

    async fn window_admit(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> StoreResult<WindowAdmission> {
        let now_ms = Utc::now().timestamp_millis();
        let member = format!("{now_ms}-{:016x}", rand::random::<u64>());
        let (admitted, count): (i64, i64) = self
            .admit
            .key(key)
            .arg(now_ms)
            .arg(Self::millis(window))
            .arg(max_requests)
            .arg(member)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(WindowAdmission {
            admitted: admitted == 1,
            count: u32::try_from(count).unwrap_or(u32::MAX),
        })
    }

    async fn window_count(&self, key: &str, window: Duration) -> StoreResult<u32> {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(window_ms);
        let (_, count): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(cutoff)
            .cmd("ZCARD")
            .arg(key)
            .query_async(&mut self.conn())
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
