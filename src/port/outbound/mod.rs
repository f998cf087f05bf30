//! Outbound ports (driven side): interfaces implemented by outbound adapters.

pub mod notifier;
pub mod reconnector;
pub mod store;
