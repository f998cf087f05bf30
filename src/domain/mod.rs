//! Exchange-agnostic resilience types.
//!
//! Everything here is plain data plus the pure math that goes with it
//! (backoff delays, key rendering, header formatting). Services that own
//! state and talk to a backing store live in [`crate::runtime`].

pub mod cache_key;
pub mod connection;
pub mod policy;
pub mod stats;
pub mod throttle;

pub use cache_key::CacheKey;
pub use connection::{ConnectionContext, ConnectionState, Subscriptions};
pub use policy::ReconnectPolicy;
pub use stats::{
    CacheStats, ObservabilitySnapshot, OperationStats, PerformanceReport, ReconnectStats,
    TimeRange,
};
pub use throttle::{ThrottleDecision, ThrottleLimit, ThrottlePreset};
