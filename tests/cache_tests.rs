use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ballast::adapter::outbound::MemoryStore;
use ballast::domain::CacheKey;
use ballast::runtime::ResultCache;
use ballast::testkit::store::BrokenStore;
use serde::{Deserialize, Serialize};

fn cache() -> ResultCache {
    ResultCache::new("results", Arc::new(MemoryStore::new())).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Quote {
    bid: f64,
    ask: f64,
}

#[tokio::test(start_paused = true)]
async fn expired_value_is_a_single_miss() {
    let cache = cache();
    cache.set("k", "v", Some(Duration::from_secs(1))).await;

    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
    let before = cache.stats().await;

    tokio::time::advance(Duration::from_secs(1)).await;

    assert_eq!(cache.get::<String>("k").await, None);
    let after = cache.stats().await;
    assert_eq!(after.misses, before.misses + 1);
    assert_eq!(after.evictions, before.evictions + 1);
    assert_eq!(after.size, 0);
}

#[tokio::test]
async fn typed_values_round_trip() {
    let cache = cache();
    let quote = Quote { bid: 0.41, ask: 0.43 };

    assert!(cache.set("q", &quote, None).await);
    assert_eq!(cache.get::<Quote>("q").await, Some(quote));
}

#[tokio::test]
async fn clear_pattern_counts_exactly_and_spares_others() {
    let cache = cache();
    for key in ["foo:1", "foo:2", "foo:3", "bar:1"] {
        cache.set(key, &1, None).await;
    }

    assert_eq!(cache.clear_pattern("foo:*").await, 3);
    assert!(cache.exists("bar:1").await);
    assert!(!cache.exists("foo:2").await);

    let stats = cache.stats().await;
    assert_eq!(stats.size, 1);
    assert_eq!(stats.evictions, 3);
}

#[tokio::test]
async fn clear_pattern_matches_structured_keys() {
    let cache = cache();
    let a = CacheKey::new("book").field("market", "BTC").field("depth", 5);
    let b = CacheKey::new("book").field("market", "ETH").field("depth", 5);
    let other = CacheKey::new("trades").field("market", "BTC");
    for key in [&a, &b, &other] {
        cache.set(key, &0, None).await;
    }

    assert_eq!(cache.clear_pattern(&CacheKey::namespace_pattern("book")).await, 2);
    assert!(cache.exists(&other).await);
}

#[tokio::test]
async fn hit_rate_tracks_hits_and_misses() {
    let cache = cache();
    assert_eq!(cache.stats().await.hit_rate, 0.0);

    cache.set("k", &1, None).await;
    for _ in 0..3 {
        cache.get::<i32>("k").await;
    }
    cache.get::<i32>("absent").await;

    let stats = cache.stats().await;
    assert_eq!((stats.hits, stats.misses), (3, 1));
    assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn get_or_set_runs_factory_once_within_ttl() {
    let cache = cache();
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let factory = move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        42_u64
    };

    let first = cache
        .get_or_set("x", factory, Some(Duration::from_secs(10)))
        .await;
    tokio::time::advance(Duration::from_secs(5)).await;
    let second = cache
        .get_or_set("x", factory, Some(Duration::from_secs(10)))
        .await;

    assert_eq!((first, second), (42, 42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(5)).await;
    cache
        .get_or_set("x", factory, Some(Duration::from_secs(10)))
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn try_get_or_set_does_not_cache_errors() {
    let cache = cache();

    let failed: Result<u32, String> = cache
        .try_get_or_set("x", || async { Err("upstream down".to_string()) }, None)
        .await;
    assert_eq!(failed, Err("upstream down".to_string()));
    assert!(!cache.exists("x").await);

    let ok: Result<u32, String> = cache.try_get_or_set("x", || async { Ok(7) }, None).await;
    assert_eq!(ok, Ok(7));
    assert_eq!(cache.get::<u32>("x").await, Some(7));
}

#[tokio::test(start_paused = true)]
async fn ttl_and_expire() {
    let cache = cache();
    cache.set("persistent", &1, None).await;
    cache.set("short", &1, Some(Duration::from_secs(30))).await;

    assert_eq!(cache.ttl("persistent").await, None);
    assert_eq!(cache.ttl("absent").await, None);
    assert_eq!(cache.ttl("short").await, Some(Duration::from_secs(30)));

    assert!(cache.expire("persistent", Duration::from_secs(5)).await);
    assert!(!cache.expire("absent", Duration::from_secs(5)).await);
    assert_eq!(cache.ttl("persistent").await, Some(Duration::from_secs(5)));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(!cache.exists("persistent").await);
}

#[tokio::test]
async fn delete_is_not_an_eviction() {
    let cache = cache();
    cache.set("k", &1, None).await;

    assert!(cache.delete("k").await);
    assert!(!cache.delete("k").await);
    assert_eq!(cache.stats().await.evictions, 0);
}

#[tokio::test]
async fn counters_are_independent_of_ttl() {
    let cache = cache();
    assert_eq!(cache.increment("hits", 1).await, Some(1));
    assert_eq!(cache.increment("hits", 4).await, Some(5));
    assert_eq!(cache.decrement("hits", 2).await, Some(3));
    assert_eq!(cache.get::<i64>("hits").await, Some(3));
}

#[tokio::test(start_paused = true)]
async fn purge_expired_counts_evictions() {
    let cache = cache();
    cache.set("a", &1, Some(Duration::from_secs(1))).await;
    cache.set("b", &1, Some(Duration::from_secs(1))).await;
    cache.set("c", &1, None).await;

    tokio::time::advance(Duration::from_secs(2)).await;

    assert_eq!(cache.purge_expired().await, 2);
    let stats = cache.stats().await;
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.size, 1);
    // Already purged: not counted again on read.
    assert_eq!(cache.get::<i32>("a").await, None);
    assert_eq!(cache.stats().await.evictions, 2);
}

// ---------------------------------------------------------------------------
// Fail-soft
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_errors_behave_like_misses() {
    let cache = ResultCache::new("results", Arc::new(BrokenStore::failing())).unwrap();

    assert!(!cache.set("k", &1, None).await);
    assert_eq!(cache.get::<i32>("k").await, None);
    assert!(!cache.exists("k").await);
    assert_eq!(cache.increment("n", 1).await, None);
    assert_eq!(cache.clear_pattern("*").await, 0);

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 0);
}

#[tokio::test]
async fn get_or_set_still_computes_without_store() {
    let cache = ResultCache::new("results", Arc::new(BrokenStore::failing())).unwrap();
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    for _ in 0..2 {
        let value = cache
            .get_or_set(
                "x",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "fresh".to_string()
                },
                None,
            )
            .await;
        assert_eq!(value, "fresh");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out_to_a_miss() {
    let cache = ResultCache::new("results", Arc::new(BrokenStore::hanging()))
        .unwrap()
        .with_op_timeout(Duration::from_millis(20));

    assert_eq!(cache.get::<i32>("k").await, None);
    assert!(!cache.set("k", &1, None).await);
}

#[test]
fn usable_from_a_plain_blocking_context() {
    let cache = cache();
    let quote = Quote { bid: 1.0, ask: 1.5 };

    tokio_test::block_on(async {
        assert!(cache.set("spot", &quote, None).await);
        assert_eq!(cache.get::<Quote>("spot").await, Some(quote));
    });
}
