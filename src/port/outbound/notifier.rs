//! Notifier port for connection lifecycle notifications.
//!
//! The supervisor reports exactly two asynchronous outcomes per recovery:
//! the connection came back, or the retry budget ran out.

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Events that can trigger notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Reconnect succeeded and subscriptions were restored.
    ConnectionRestored {
        connection_id: String,
        category: String,
        attempts: u32,
    },
    /// Retry budget exhausted. Requires administrative re-registration.
    ReconnectFailed {
        connection_id: String,
        category: String,
        attempts: u32,
        last_error: Option<String>,
        at: DateTime<Utc>,
    },
}

impl Event {
    #[must_use]
    pub fn connection_id(&self) -> &str {
        match self {
            Self::ConnectionRestored { connection_id, .. }
            | Self::ReconnectFailed { connection_id, .. } => connection_id,
        }
    }
}

/// Trait for notification handlers.
///
/// Notifications are fire-and-forget.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - `notify` is called while the supervisor holds its registry lock; it
///   must return quickly and must not call back into the supervisor. Spawn
///   a task for slow delivery (HTTP, chat bots).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event);
}

/// Registry of notifiers (composite pattern).
///
/// Broadcasts events to all registered notifiers.
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { notifiers: vec![] }
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for NotifierRegistry {
    fn notify(&self, event: Event) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A no-op notifier for when notifications are disabled.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: Event) {}
}

/// A logging notifier that logs events via tracing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event) {
        match event {
            Event::ConnectionRestored {
                connection_id,
                category,
                attempts,
            } => {
                info!(%connection_id, %category, attempts, "Connection restored");
            }
            Event::ReconnectFailed {
                connection_id,
                category,
                attempts,
                last_error,
                at,
            } => {
                error!(
                    %connection_id,
                    %category,
                    attempts,
                    last_error = last_error.as_deref().unwrap_or("none"),
                    at = %at,
                    "Reconnect failed permanently, manual intervention required"
                );
            }
        }
    }
}
