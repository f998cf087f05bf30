//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the seams between the resilience services and the systems
//! around them.
//!
//! ```text
//!   streaming adapter ──► Reconnector ◄── ConnectionSupervisor ──► Notifier
//!                                                 │
//!   ThrottleWindow ──┐                            ▼
//!                    ├──► KeyStore          Observability
//!   ResultCache ─────┘
//! ```
//!
//! # Available Ports
//!
//! - [`KeyStore`] - Shared key/counter store backing throttles and caches
//! - [`Reconnector`] - Fresh handshake plus resubscription, owned by the stream adapter
//! - [`Notifier`] - Terminal failure and restoration notifications

pub mod outbound;

pub use outbound::notifier::{Event, LogNotifier, Notifier, NotifierRegistry, NullNotifier};
pub use outbound::reconnector::{ReconnectRequest, Reconnector};
pub use outbound::store::{KeyStore, KeyTtl, Lookup, Removal, WindowAdmission};
