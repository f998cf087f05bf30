//! Ballast - operational resilience for trading backends.
//!
//! This crate keeps long-lived market-data streams alive across failures,
//! throttles request traffic with sliding windows, and caches expensive
//! results with bounded lifetimes and eviction accounting.
//!
//! # Architecture
//!
//! The crate follows a ports-and-adapters layout:
//!
//! - **`domain`** - Plain types and pure math: connection states, backoff
//!   policy, throttle limits and decisions, cache keys, statistics
//! - **`port`** - Seams to the outside: backing [`KeyStore`](port::KeyStore),
//!   stream [`Reconnector`](port::Reconnector), failure [`Notifier`](port::Notifier)
//! - **`adapter`** - Store implementations
//!   - `MemoryStore` - In-process, sharded maps
//!   - `RedisStore` - Shared across processes (requires `redis` feature)
//! - **`runtime`** - The services built on those ports
//!
//! # Modules
//!
//! - [`domain`] - Exchange-agnostic types
//! - [`port`] - Trait definitions
//! - [`adapter`] - Backing store implementations
//! - [`runtime`] - `ConnectionSupervisor`, `ThrottleWindow`, `ResultCache`, `Observability`
//! - [`infrastructure`] - Configuration loading from TOML files
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `redis` - Enable the Redis backing store
//! - `testkit` - Expose test doubles to integration tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ballast::infrastructure::config::Config;
//! use ballast::port::LogNotifier;
//! use ballast::runtime::Services;
//!
//! # async fn run() -> ballast::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! config.init_logging();
//!
//! let services = Services::build(&config, Arc::new(LogNotifier)).await?;
//! if let Some(strict) = services.throttle("strict") {
//!     let decision = strict.check("user-42", "/orders").await;
//!     assert!(decision.limit > 0);
//! }
//! services.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod runtime;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
