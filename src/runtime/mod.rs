//! Resilience services and their wiring.
//!
//! - [`ConnectionSupervisor`] - reconnect loops with backoff for stream adapters
//! - [`ThrottleWindow`] / [`Throttles`] - sliding-window admission per preset
//! - [`ResultCache`] - TTL memoization with hit/miss/eviction accounting
//! - [`Observability`] - aggregate cache and timing statistics
//! - [`Services`] - builds all of the above from one configuration

mod cache;
mod observability;
mod services;
mod supervisor;
mod throttle;

use std::future::Future;
use std::time::Duration;

pub use cache::ResultCache;
pub use observability::{Observability, MAX_SAMPLES};
pub use services::{connect_store, Services};
pub use supervisor::ConnectionSupervisor;
pub use throttle::{ThrottleWindow, Throttles, DEFAULT_OP_TIMEOUT};

use crate::error::{StoreError, StoreResult};

/// Run one store call, turning an overrun into [`StoreError::Timeout`].
async fn bounded<T>(limit: Duration, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit)))
}
