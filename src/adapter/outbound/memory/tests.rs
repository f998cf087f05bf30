use std::sync::Arc;
use std::time::Duration;

use super::*;

fn bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

// ---------------------------------------------------------------------------
// Key/value
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn set_then_get_returns_value() {
    let store = MemoryStore::new();
    store.set("k", bytes("v"), None).await.unwrap();

    assert_eq!(store.get("k").await.unwrap(), Lookup::Hit(bytes("v")));
    assert_eq!(store.get("other").await.unwrap(), Lookup::Missing);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_reports_expired_once() {
    let store = MemoryStore::new();
    store
        .set("k", bytes("v"), Some(Duration::from_secs(1)))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(1)).await;

    assert_eq!(store.get("k").await.unwrap(), Lookup::Expired);
    assert_eq!(store.get("k").await.unwrap(), Lookup::Missing);
}

#[tokio::test(start_paused = true)]
async fn ttl_reports_remaining_lifetime() {
    let store = MemoryStore::new();
    store
        .set("k", bytes("v"), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    store.set("forever", bytes("v"), None).await.unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;

    assert_eq!(
        store.ttl("k").await.unwrap(),
        KeyTtl::Expires(Duration::from_secs(6))
    );
    assert_eq!(store.ttl("forever").await.unwrap(), KeyTtl::Persistent);
    assert_eq!(store.ttl("absent").await.unwrap(), KeyTtl::Missing);
}

#[tokio::test(start_paused = true)]
async fn expire_overwrites_existing_expiry() {
    let store = MemoryStore::new();
    store.set("k", bytes("v"), None).await.unwrap();

    assert!(store.expire("k", Duration::from_secs(2)).await.unwrap());
    assert!(!store.expire("absent", Duration::from_secs(2)).await.unwrap());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!store.exists("k").await.unwrap());
}

#[tokio::test]
async fn delete_reports_whether_key_was_live() {
    let store = MemoryStore::new();
    store.set("k", bytes("v"), None).await.unwrap();

    assert!(store.delete("k").await.unwrap());
    assert!(!store.delete("k").await.unwrap());
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_matching_counts_only_matching_keys() {
    let store = MemoryStore::new();
    for key in ["foo:1", "foo:2", "foo:3", "bar:1"] {
        store.set(key, bytes("v"), None).await.unwrap();
    }

    assert_eq!(
        store.delete_matching("foo:*").await.unwrap(),
        Removal { live: 3, expired: 0 }
    );
    assert!(store.exists("bar:1").await.unwrap());
    assert_eq!(store.count_matching("*").await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn delete_matching_reports_expired_apart() {
    let store = MemoryStore::new();
    store
        .set("foo:old", bytes("v"), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    store.set("foo:new", bytes("v"), None).await.unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;

    assert_eq!(
        store.delete_matching("foo:*").await.unwrap(),
        Removal { live: 1, expired: 1 }
    );
    assert_eq!(store.count_matching("foo:*").await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_pattern_is_an_error() {
    let store = MemoryStore::new();
    let err = store.delete_matching("foo[").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidPattern { .. }));
}

#[tokio::test(start_paused = true)]
async fn purge_expired_removes_only_expired() {
    let store = MemoryStore::new();
    store
        .set("c:a", bytes("v"), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    store.set("c:b", bytes("v"), None).await.unwrap();

    tokio::time::advance(Duration::from_secs(1)).await;

    assert_eq!(store.purge_expired("c:*").await.unwrap(), 1);
    assert!(store.exists("c:b").await.unwrap());
}

#[tokio::test]
async fn trim_drops_oldest_first() {
    let store = MemoryStore::new();
    for key in ["c:1", "c:2", "c:3", "c:4"] {
        store.set(key, bytes("v"), None).await.unwrap();
    }

    assert_eq!(store.trim_matching("c:*", 2).await.unwrap(), 2);
    assert!(!store.exists("c:1").await.unwrap());
    assert!(!store.exists("c:2").await.unwrap());
    assert!(store.exists("c:3").await.unwrap());
    assert!(store.exists("c:4").await.unwrap());
    assert_eq!(store.trim_matching("c:*", 2).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn incr_by_creates_and_accumulates() {
    let store = MemoryStore::new();

    assert_eq!(store.incr_by("n", 1).await.unwrap(), 1);
    assert_eq!(store.incr_by("n", 5).await.unwrap(), 6);
    assert_eq!(store.incr_by("n", -10).await.unwrap(), -4);
}

#[tokio::test]
async fn incr_by_rejects_non_integer() {
    let store = MemoryStore::new();
    store.set("n", bytes("\"text\""), None).await.unwrap();

    let err = store.incr_by("n", 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotAnInteger { .. }));
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                store.incr_by("n", 1).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.incr_by("n", 0).await.unwrap(), 800);
}

// ---------------------------------------------------------------------------
// Sliding windows
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn window_admits_up_to_limit() {
    let store = MemoryStore::new();
    let window = Duration::from_secs(60);

    for expected in 0..3 {
        let admission = store.window_admit("w", window, 3).await.unwrap();
        assert!(admission.admitted);
        assert_eq!(admission.count, expected);
    }

    let denied = store.window_admit("w", window, 3).await.unwrap();
    assert!(!denied.admitted);
    assert_eq!(denied.count, 3);
    assert_eq!(store.window_count("w", window).await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn window_slides() {
    let store = MemoryStore::new();
    let window = Duration::from_secs(10);

    store.window_admit("w", window, 2).await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    store.window_admit("w", window, 2).await.unwrap();
    assert!(!store.window_admit("w", window, 2).await.unwrap().admitted);

    // First entry leaves the window, second is still inside.
    tokio::time::advance(Duration::from_secs(4)).await;
    let admission = store.window_admit("w", window, 2).await.unwrap();
    assert!(admission.admitted);
    assert_eq!(admission.count, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_window_admissions_never_exceed_limit() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..50 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .window_admit("w", Duration::from_secs(60), 10)
                .await
                .unwrap()
                .admitted
        }));
    }

    let mut admitted = 0;
    for h in handles {
        if h.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn delete_clears_window() {
    let store = MemoryStore::new();
    store
        .window_admit("w", Duration::from_secs(60), 1)
        .await
        .unwrap();

    assert!(store.delete("w").await.unwrap());
    assert_eq!(store.window_count("w", Duration::from_secs(60)).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn quiet_windows_are_dropped_on_count() {
    let store = MemoryStore::new();
    let window = Duration::from_secs(10);
    store.window_admit("w", window, 3).await.unwrap();

    tokio::time::advance(window).await;

    assert_eq!(store.window_count("w", window).await.unwrap(), 0);
    assert_eq!(store.windows.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_windows_are_reclaimed_by_purge() {
    let store = MemoryStore::new();
    for i in 0..1000 {
        store
            .window_admit(&format!("t:client-{i}"), Duration::from_secs(60), 5)
            .await
            .unwrap();
    }
    store
        .window_admit("other:client", Duration::from_secs(60), 5)
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(3600)).await;

    assert_eq!(store.purge_idle_windows("t:*").await.unwrap(), 1000);
    assert_eq!(store.windows.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn purge_keeps_windows_with_recent_entries() {
    let store = MemoryStore::new();
    store
        .window_admit("t:long", Duration::from_secs(300), 5)
        .await
        .unwrap();
    store
        .window_admit("t:short", Duration::from_secs(10), 5)
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;

    assert_eq!(store.purge_idle_windows("t:*").await.unwrap(), 1);
    assert_eq!(store.window_count("t:long", Duration::from_secs(300)).await.unwrap(), 1);
}
