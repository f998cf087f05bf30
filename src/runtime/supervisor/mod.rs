//! Reconnection supervisor.
//!
//! One cancellable reconnect loop per disconnected connection, held in a
//! registry keyed by connection id. Streaming adapters report failures with
//! [`ConnectionSupervisor::handle_disconnect`] and never block on recovery:
//! the outcome arrives later, either through their own [`Reconnector`]
//! being called successfully or through a [`Notifier`] failure event.
//!
//! Every mutation of a context (including the terminal failure notification)
//! happens under the registry lock, and a loop re-checks that it still owns
//! its slot before touching it. Once [`cancel_reconnect`] returns, the
//! cancelled loop can no longer produce side effects.
//!
//! [`cancel_reconnect`]: ConnectionSupervisor::cancel_reconnect

mod task;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::domain::{
    ConnectionContext, ConnectionState, ReconnectPolicy, ReconnectStats, Subscriptions,
};
use crate::port::{Notifier, Reconnector};
use crate::runtime::Observability;

/// Registry entry for one connection id.
struct Slot {
    context: ConnectionContext,
    reconnector: Arc<dyn Reconnector>,
    /// Present while a reconnect loop owns this slot.
    running: Option<RunningLoop>,
}

struct RunningLoop {
    generation: u64,
    token: CancellationToken,
}

impl Slot {
    fn owned_by(&self, generation: u64) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| running.generation == generation)
    }
}

struct Shared {
    policy: ReconnectPolicy,
    notifier: Arc<dyn Notifier>,
    observability: Option<Arc<Observability>>,
    registry: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
    /// Parent of every loop token; cancelled on shutdown.
    root: CancellationToken,
    tracker: TaskTracker,
}

fn log_transition(context: &ConnectionContext, from: ConnectionState) {
    info!(
        connection_id = %context.connection_id,
        category = %context.category,
        from = %from,
        to = %context.state,
        retry_count = context.retry_count,
        "Connection state changed"
    );
}

/// Supervises reconnection of streaming connections.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
}

impl ConnectionSupervisor {
    pub fn new(
        policy: ReconnectPolicy,
        notifier: Arc<dyn Notifier>,
        observability: Option<Arc<Observability>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                policy,
                notifier,
                observability,
                registry: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.shared.policy
    }

    /// Record a connection failure and make sure recovery is under way.
    ///
    /// - Unknown id: a context is created and a reconnect loop is spawned.
    /// - Loop already running: the error is recorded, `subscriptions` are
    ///   merged into the ones to restore, and `reconnector` replaces the
    ///   previous one. The running loop uses them on its next attempt.
    /// - Context already failed: the error is recorded but nothing restarts
    ///   until [`clear_failed`](Self::clear_failed) is called.
    ///
    /// Returns the state of the context after the call. Must be called from
    /// within a Tokio runtime.
    pub fn handle_disconnect(
        &self,
        connection_id: &str,
        category: &str,
        subscription_key: &str,
        error: &str,
        reconnector: Arc<dyn Reconnector>,
        subscriptions: Subscriptions,
    ) -> ConnectionState {
        if self.shared.root.is_cancelled() {
            warn!(connection_id, "Supervisor is shut down, ignoring disconnect");
            return ConnectionState::Disconnected;
        }

        let mut registry = self.shared.registry.lock();
        let slot = match registry.entry(connection_id.to_string()) {
            Entry::Occupied(occupied) => {
                let slot = occupied.into_mut();
                slot.context.last_error = Some(error.to_string());
                slot.context.subscriptions_to_restore.extend(subscriptions);
                slot.reconnector = reconnector;
                if slot.running.is_some() || slot.context.state.is_terminal() {
                    debug!(
                        connection_id,
                        state = %slot.context.state,
                        "Disconnect for connection already under supervision"
                    );
                    return slot.context.state;
                }
                slot
            }
            Entry::Vacant(vacant) => {
                let mut context = ConnectionContext::new(
                    connection_id,
                    category,
                    subscription_key,
                    subscriptions,
                );
                context.last_error = Some(error.to_string());
                warn!(
                    connection_id,
                    category,
                    error,
                    "Connection lost, starting supervised recovery"
                );
                vacant.insert(Slot {
                    context,
                    reconnector,
                    running: None,
                })
            }
        };

        if let Some(from) = slot.context.transition(ConnectionState::Reconnecting) {
            log_transition(&slot.context, from);
        }

        if self.shared.policy.max_retries() == 0 {
            task::fail(&self.shared, slot);
            return slot.context.state;
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shared.root.child_token();
        slot.running = Some(RunningLoop {
            generation,
            token: token.clone(),
        });
        let state = slot.context.state;
        drop(registry);

        self.shared.tracker.spawn(task::run(
            Arc::clone(&self.shared),
            connection_id.to_string(),
            generation,
            token,
        ));
        state
    }

    /// Stop recovery for `connection_id` and forget it.
    ///
    /// No attempt is started and no notification is emitted for this id once
    /// this returns. An attempt already in flight completes, but its outcome
    /// is discarded. Returns whether a context existed.
    pub fn cancel_reconnect(&self, connection_id: &str) -> bool {
        let removed = self.shared.registry.lock().remove(connection_id);
        let Some(slot) = removed else {
            return false;
        };
        if let Some(running) = slot.running {
            running.token.cancel();
        }
        info!(
            connection_id,
            category = %slot.context.category,
            state = %slot.context.state,
            "Reconnect cancelled"
        );
        true
    }

    /// Remove a failed context so the next disconnect starts a fresh recovery.
    ///
    /// Contexts in any other state are left alone. Returns whether one was removed.
    pub fn clear_failed(&self, connection_id: &str) -> bool {
        let mut registry = self.shared.registry.lock();
        let failed = registry
            .get(connection_id)
            .is_some_and(|slot| slot.context.state.is_terminal());
        if failed {
            registry.remove(connection_id);
            info!(connection_id, "Failed connection cleared for re-registration");
        }
        failed
    }

    /// Snapshot of the context for `connection_id`, if one exists.
    #[must_use]
    pub fn context(&self, connection_id: &str) -> Option<ConnectionContext> {
        self.shared
            .registry
            .lock()
            .get(connection_id)
            .map(|slot| slot.context.clone())
    }

    #[must_use]
    pub fn get_reconnect_stats(&self) -> ReconnectStats {
        let registry = self.shared.registry.lock();
        let mut states = std::collections::BTreeMap::new();
        let mut active_reconnects = 0;
        for slot in registry.values() {
            *states.entry(slot.context.state).or_insert(0) += 1;
            if slot.running.is_some() {
                active_reconnects += 1;
            }
        }
        ReconnectStats {
            active_reconnects,
            total_contexts: registry.len(),
            states,
            max_retries: self.shared.policy.max_retries(),
            max_delay: self.shared.policy.max_delay(),
        }
    }

    /// Cancel every loop, drop every context, and wait for the loops to exit.
    ///
    /// Later disconnects are ignored.
    pub async fn shutdown(&self) {
        self.shared.root.cancel();
        let dropped = {
            let mut registry = self.shared.registry.lock();
            let dropped = registry.len();
            registry.clear();
            dropped
        };
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        info!(contexts = dropped, "Connection supervisor stopped");
    }
}
