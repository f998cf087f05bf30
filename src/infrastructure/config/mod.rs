//! Infrastructure configuration modules.

pub mod cache;
pub mod logging;
pub mod observability;
pub mod reconnect;
pub mod settings;
pub mod store;
pub mod throttle;

pub use cache::CacheConfig;
pub use logging::LoggingConfig;
pub use observability::ObservabilityConfig;
pub use reconnect::ReconnectionConfig;
pub use settings::Config;
pub use store::{StoreBackend, StoreConfig};
pub use throttle::{ThrottleConfig, ThrottlePresetConfig};
