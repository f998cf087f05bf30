//! Explicit service container with an init/shutdown lifecycle.
//!
//! [`Services::build`] wires every service from one [`Config`]; nothing is
//! global, so independent instances can live side by side (one per test,
//! or one per deployment in a single process).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::cache::ResultCache;
use super::observability::Observability;
use super::supervisor::ConnectionSupervisor;
use super::throttle::{ThrottleWindow, Throttles};
use crate::adapter::outbound::MemoryStore;
use crate::domain::ObservabilitySnapshot;
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::{Config, StoreBackend, StoreConfig};
use crate::port::{KeyStore, Notifier};

/// Open the backing store described by `[store]`.
///
/// # Errors
///
/// Returns a configuration error when the redis backend is selected without
/// a URL or without the `redis` feature, and a store error if the server
/// cannot be reached.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn KeyStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Redis => {
            let url = config
                .url
                .as_deref()
                .ok_or(ConfigError::MissingField { field: "url" })?;
            connect_redis(url).await
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Result<Arc<dyn KeyStore>> {
    let store = crate::adapter::outbound::RedisStore::connect(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str) -> Result<Arc<dyn KeyStore>> {
    Err(ConfigError::invalid("backend", "redis backend requires the `redis` feature").into())
}

/// Every resilience service built from one configuration.
pub struct Services {
    pub store: Arc<dyn KeyStore>,
    pub supervisor: ConnectionSupervisor,
    pub throttles: Throttles,
    pub caches: BTreeMap<String, ResultCache>,
    pub observability: Arc<Observability>,
    sweeper: Option<Sweeper>,
}

struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Services {
    /// Connect the configured store and build every service on it.
    pub async fn build(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let store = connect_store(&config.store).await?;
        Self::with_store(config, store, notifier)
    }

    /// Build every service on an already-open store.
    ///
    /// Must be called from within a Tokio runtime when the sweep is enabled.
    pub fn with_store(
        config: &Config,
        store: Arc<dyn KeyStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;

        let observability = Arc::new(Observability::new(&config.observability));
        let supervisor = ConnectionSupervisor::new(
            config.reconnect.to_policy()?,
            notifier,
            Some(Arc::clone(&observability)),
        );
        let throttles = Throttles::build(&config.throttle, &config.store, &store)?;

        let mut caches = BTreeMap::new();
        for (name, cache_config) in &config.cache {
            let cache = ResultCache::new(name, Arc::clone(&store))?
                .with_key_prefix(&config.store.key_prefix)
                .with_op_timeout(config.store.op_timeout())
                .with_config(cache_config)?;
            observability.register_cache(cache.clone());
            caches.insert(name.clone(), cache);
        }

        let sweeper = config.store.sweep_interval().map(|interval| {
            spawn_sweeper(
                interval,
                caches.values().cloned().collect(),
                throttles.windows().cloned().collect(),
            )
        });

        info!(
            backend = store.backend_name(),
            throttles = throttles.len(),
            caches = caches.len(),
            max_retries = supervisor.policy().max_retries(),
            "Resilience services ready"
        );

        Ok(Self {
            store,
            supervisor,
            throttles,
            caches,
            observability,
            sweeper,
        })
    }

    #[must_use]
    pub fn cache(&self, name: &str) -> Option<&ResultCache> {
        self.caches.get(name)
    }

    #[must_use]
    pub fn throttle(&self, preset: &str) -> Option<&ThrottleWindow> {
        self.throttles.get(preset)
    }

    pub async fn snapshot(&self) -> ObservabilitySnapshot {
        self.observability.snapshot(Some(&self.supervisor)).await
    }

    /// Stop the sweep and every reconnect loop.
    ///
    /// The sweep purges expired cache entries and idle throttle windows.
    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.token.cancel();
            let _ = sweeper.handle.await;
        }
        self.supervisor.shutdown().await;
        info!("Resilience services stopped");
    }
}

fn spawn_sweeper(
    interval: Duration,
    caches: Vec<ResultCache>,
    throttles: Vec<ThrottleWindow>,
) -> Sweeper {
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancelled.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            for cache in &caches {
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    debug!(cache = %cache.name(), purged, "Expired cache entries swept");
                }
            }
            for throttle in &throttles {
                let purged = throttle.purge_idle().await;
                if purged > 0 {
                    debug!(preset = %throttle.preset(), purged, "Idle throttle windows swept");
                }
            }
        }
    });
    Sweeper { token, handle }
}
