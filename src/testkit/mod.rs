//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`reconnector`] - `ScriptedReconnector`, a [`Reconnector`](crate::port::Reconnector)
//!   that replays scripted outcomes and records every call.
//! - [`notifier`] - `RecordingNotifier`, captures supervisor events.
//! - [`store`] - `BrokenStore`, a [`KeyStore`](crate::port::KeyStore) that fails or hangs,
//!   and `UnboundedStore`, which cannot trim to a capacity.
//! - [`config`] - Canonical test configurations and policies.

pub mod config;
pub mod notifier;
pub mod reconnector;
pub mod store;
