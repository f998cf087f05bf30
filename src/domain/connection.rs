//! Connection lifecycle types for the reconnection supervisor.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stream name to subscription parameters, restored after a reconnect.
///
/// Ordered so resubscription happens in a deterministic sequence.
pub type Subscriptions = BTreeMap<String, serde_json::Value>;

/// Lifecycle state of a supervised connection.
///
/// Transitions only move forward:
/// `Connected -> Disconnected -> Reconnecting -> {Connected | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
    /// Retry budget exhausted. Terminal until cleared administratively.
    Failed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal forward transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connected, Self::Disconnected)
                | (Self::Disconnected, Self::Reconnecting)
                | (Self::Reconnecting, Self::Connected)
                | (Self::Reconnecting, Self::Failed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovery bookkeeping for one connection.
///
/// Created on the first disconnect signal for a `connection_id`, mutated only
/// by the supervisor's reconnect loop for that id, and removed on a
/// successful reconnect or an explicit cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionContext {
    pub connection_id: String,
    /// Grouping label, typically the exchange name.
    pub category: String,
    pub subscription_key: String,
    pub retry_count: u32,
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub subscriptions_to_restore: Subscriptions,
}

impl ConnectionContext {
    #[must_use]
    pub fn new(
        connection_id: impl Into<String>,
        category: impl Into<String>,
        subscription_key: impl Into<String>,
        subscriptions_to_restore: Subscriptions,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            category: category.into(),
            subscription_key: subscription_key.into(),
            retry_count: 0,
            state: ConnectionState::Disconnected,
            last_error: None,
            last_attempt: None,
            subscriptions_to_restore,
        }
    }

    /// Move to `next`, returning the previous state.
    ///
    /// Illegal transitions are refused and leave the context untouched.
    pub fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if !self.state.can_transition_to(next) {
            return None;
        }
        let previous = self.state;
        self.state = next;
        Some(previous)
    }
}
