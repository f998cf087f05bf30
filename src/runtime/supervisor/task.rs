//! The per-connection reconnect loop.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{log_transition, Shared, Slot};
use crate::domain::ConnectionState;
use crate::port::{Event, ReconnectRequest};

/// Mark `slot` failed and emit the terminal notification.
///
/// Caller holds the registry lock.
pub(super) fn fail(shared: &Shared, slot: &mut Slot) {
    slot.running = None;
    if let Some(from) = slot.context.transition(ConnectionState::Failed) {
        log_transition(&slot.context, from);
    }
    error!(
        connection_id = %slot.context.connection_id,
        category = %slot.context.category,
        attempts = slot.context.retry_count,
        last_error = slot.context.last_error.as_deref().unwrap_or(""),
        "Reconnect retries exhausted, connection failed"
    );
    shared.notifier.notify(Event::ReconnectFailed {
        connection_id: slot.context.connection_id.clone(),
        category: slot.context.category.clone(),
        attempts: slot.context.retry_count,
        last_error: slot.context.last_error.clone(),
        at: Utc::now(),
    });
}

pub(super) async fn run(
    shared: Arc<Shared>,
    connection_id: String,
    generation: u64,
    token: CancellationToken,
) {
    loop {
        let retry_count = {
            let mut registry = shared.registry.lock();
            let Some(slot) = registry
                .get_mut(&connection_id)
                .filter(|slot| slot.owned_by(generation))
            else {
                return;
            };
            if slot.context.retry_count >= shared.policy.max_retries() {
                fail(&shared, slot);
                return;
            }
            slot.context.retry_count
        };

        let delay = shared.policy.delay(retry_count, &mut rand::thread_rng());
        debug!(
            connection_id = %connection_id,
            attempt = retry_count + 1,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after delay"
        );

        tokio::select! {
            biased;
            () = token.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        let (request, reconnector) = {
            let mut registry = shared.registry.lock();
            let Some(slot) = registry
                .get_mut(&connection_id)
                .filter(|slot| slot.owned_by(generation))
            else {
                return;
            };
            slot.context.retry_count += 1;
            slot.context.last_attempt = Some(Utc::now());
            let request = ReconnectRequest {
                connection_id: connection_id.clone(),
                category: slot.context.category.clone(),
                subscription_key: slot.context.subscription_key.clone(),
                subscriptions: slot.context.subscriptions_to_restore.clone(),
                attempt: slot.context.retry_count,
            };
            (request, Arc::clone(&slot.reconnector))
        };

        let started = Instant::now();
        let outcome = reconnector.reconnect(&request).await;
        if let Some(observability) = &shared.observability {
            observability.record_operation(
                &format!("reconnect.{}", request.category),
                started.elapsed(),
            );
        }

        let mut registry = shared.registry.lock();
        let owned = registry
            .get(&connection_id)
            .is_some_and(|slot| slot.owned_by(generation));
        if !owned {
            debug!(connection_id = %connection_id, "Discarding attempt outcome after cancel");
            return;
        }

        match outcome {
            Ok(true) => {
                let Some(mut slot) = registry.remove(&connection_id) else {
                    return;
                };
                let attempts = slot.context.retry_count;
                slot.running = None;
                slot.context.retry_count = 0;
                slot.context.last_error = None;
                if let Some(from) = slot.context.transition(ConnectionState::Connected) {
                    log_transition(&slot.context, from);
                }
                info!(
                    connection_id = %connection_id,
                    category = %slot.context.category,
                    attempts,
                    restored = slot.context.subscriptions_to_restore.len(),
                    "Reconnected and subscriptions restored"
                );
                shared.notifier.notify(Event::ConnectionRestored {
                    connection_id,
                    category: slot.context.category,
                    attempts,
                });
                return;
            }
            Ok(false) => {
                if let Some(slot) = registry.get_mut(&connection_id) {
                    slot.context.last_error =
                        Some(format!("reconnect attempt {} unsuccessful", request.attempt));
                }
                warn!(
                    connection_id = %connection_id,
                    attempt = request.attempt,
                    "Reconnect attempt unsuccessful"
                );
            }
            Err(e) => {
                if let Some(slot) = registry.get_mut(&connection_id) {
                    slot.context.last_error = Some(e.to_string());
                }
                warn!(
                    connection_id = %connection_id,
                    attempt = request.attempt,
                    error = %e,
                    "Reconnect attempt failed"
                );
            }
        }
    }
}
