use std::sync::Arc;
use std::time::Duration;

use ballast::adapter::outbound::MemoryStore;
use ballast::domain::ConnectionState;
use ballast::infrastructure::config::{CacheConfig, Config, ThrottlePresetConfig};
use ballast::port::{KeyStore, NullNotifier};
use ballast::runtime::Services;
use ballast::testkit::config::config;
use ballast::testkit::notifier::RecordingNotifier;
use ballast::testkit::reconnector::ScriptedReconnector;

#[tokio::test]
async fn builds_every_service_from_config() {
    let services = Services::build(&config(), Arc::new(NullNotifier))
        .await
        .unwrap();

    assert_eq!(services.store.backend_name(), "memory");
    assert!(services.cache("quotes").is_some());
    assert!(services.cache("missing").is_none());
    assert_eq!(services.throttle("strict").unwrap().limit().max_requests(), 10);
    assert_eq!(services.supervisor.policy().max_retries(), 5);

    let snapshot = services.snapshot().await;
    assert!(snapshot.caches.contains_key("quotes"));
    assert_eq!(snapshot.reconnects.unwrap().total_contexts, 0);

    services.shutdown().await;
}

#[tokio::test]
async fn independent_instances_do_not_share_state() {
    let a = Services::build(&config(), Arc::new(NullNotifier)).await.unwrap();
    let b = Services::build(&config(), Arc::new(NullNotifier)).await.unwrap();

    a.cache("quotes").unwrap().set("k", &1, None).await;
    assert_eq!(b.cache("quotes").unwrap().get::<i32>("k").await, None);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn caches_share_store_under_prefix() {
    let mut config = config();
    config.store.key_prefix = "desk-7:".to_string();
    let store = Arc::new(MemoryStore::new());
    let services = Services::with_store(&config, store.clone(), Arc::new(NullNotifier)).unwrap();

    services.cache("quotes").unwrap().set("k", &1, None).await;
    let cache = services.cache("quotes").unwrap();
    assert_eq!(cache.namespace(), "desk-7:cache:quotes:");
    assert!(store.exists("desk-7:cache:quotes:k").await.unwrap());

    services.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn sweep_purges_expired_entries() {
    let mut config = config();
    config.store.sweep_interval_secs = 1;
    let services = Services::build(&config, Arc::new(NullNotifier)).await.unwrap();
    let cache = services.cache("quotes").unwrap().clone();

    cache.set("k", &1, Some(Duration::from_millis(500))).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(cache.stats().await.evictions, 1);
    services.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn sweep_reclaims_idle_throttle_windows() {
    let mut config = config();
    config.store.sweep_interval_secs = 1;
    config.throttle.presets.insert(
        "burst".to_string(),
        ThrottlePresetConfig {
            max_requests: 3,
            window_secs: 1,
        },
    );
    let store = Arc::new(MemoryStore::new());
    let services = Services::with_store(&config, store.clone(), Arc::new(NullNotifier)).unwrap();

    for client in ["10.0.0.1", "10.0.0.2"] {
        assert!(services.throttle("burst").unwrap().check(client, "/quote").await.allowed);
    }
    store
        .window_admit("outside:w", Duration::from_secs(1), 3)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(store.purge_idle_windows("ballast:throttle:*").await.unwrap(), 0);
    assert_eq!(store.purge_idle_windows("outside:*").await.unwrap(), 1);
    services.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_supervised_recovery() {
    let notifier = RecordingNotifier::new();
    let services = Services::build(&config(), Arc::new(notifier.clone()))
        .await
        .unwrap();
    let reconnector = ScriptedReconnector::failing();

    let state = services.supervisor.handle_disconnect(
        "feed-1",
        "kraken",
        "ticker",
        "eof",
        reconnector.shared(),
        Default::default(),
    );
    assert_eq!(state, ConnectionState::Reconnecting);

    let supervisor = services.supervisor.clone();
    services.shutdown().await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(reconnector.call_count(), 0);
    assert!(notifier.events().is_empty());
    assert!(supervisor.context("feed-1").is_none());
}

#[tokio::test]
async fn invalid_cache_config_is_rejected() {
    let mut config = Config::default();
    config.cache.insert(
        "quotes".to_string(),
        CacheConfig {
            default_ttl_secs: None,
            max_entries: Some(0),
        },
    );

    let result = Services::build(&config, Arc::new(NullNotifier)).await;
    assert!(result.is_err());
}

#[cfg(not(feature = "redis"))]
#[tokio::test]
async fn redis_backend_requires_feature() {
    let mut config = config();
    config.store.backend = ballast::infrastructure::config::StoreBackend::Redis;
    config.store.url = Some("redis://127.0.0.1/".to_string());

    let result = Services::build(&config, Arc::new(NullNotifier)).await;
    assert!(result.is_err());
}
