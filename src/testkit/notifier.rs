//! Notifier that records events for assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::port::{Event, Notifier};

/// Captures every event; clones share one log.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Failure notifications emitted for `connection_id`.
    pub fn failures_for(&self, connection_id: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| {
                matches!(e, Event::ReconnectFailed { .. }) && e.connection_id() == connection_id
            })
            .count()
    }

    /// Restoration notifications emitted for `connection_id`.
    pub fn restorations_for(&self, connection_id: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| {
                matches!(e, Event::ConnectionRestored { .. }) && e.connection_id() == connection_id
            })
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: Event) {
        self.events.lock().push(event);
    }
}
