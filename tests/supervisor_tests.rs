use std::sync::Arc;
use std::time::Duration;

use ballast::domain::{ConnectionState, ReconnectPolicy, Subscriptions};
use ballast::port::{Event, NotifierRegistry};
use ballast::runtime::ConnectionSupervisor;
use ballast::testkit::config::policy;
use ballast::testkit::notifier::RecordingNotifier;
use ballast::testkit::reconnector::{Outcome, ScriptedReconnector};
use serde_json::json;
use tokio::time::{sleep, Instant};

fn book_subscriptions() -> Subscriptions {
    let mut subs = Subscriptions::new();
    subs.insert("orderbook.BTC-USD".into(), json!({ "depth": 25 }));
    subs.insert("trades.BTC-USD".into(), json!({}));
    subs
}

#[test]
fn pre_jitter_delays_double_from_initial() {
    let policy = ReconnectPolicy::new(
        3,
        Duration::from_secs(1),
        Duration::from_secs(8),
        2.0,
        0.0,
    )
    .unwrap();

    let delays: Vec<Duration> = (0..3).map(|n| policy.base_delay(n)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(policy.base_delay(10), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_is_terminal_and_reported_once() {
    let notifier = RecordingNotifier::new();
    let supervisor = ConnectionSupervisor::new(policy(3), Arc::new(notifier.clone()), None);
    let reconnector = ScriptedReconnector::new(vec![
        Outcome::Error("tls handshake".into()),
        Outcome::Fail,
        Outcome::Error("401 unauthorized".into()),
    ]);

    supervisor.handle_disconnect(
        "ws-1",
        "coinbase",
        "level2",
        "connection reset",
        reconnector.shared(),
        book_subscriptions(),
    );
    sleep(Duration::from_secs(120)).await;

    assert_eq!(reconnector.call_count(), 3);
    let events = notifier.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::ReconnectFailed {
            connection_id,
            category,
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(connection_id, "ws-1");
            assert_eq!(category, "coinbase");
            assert_eq!(*attempts, 3);
            assert_eq!(last_error.as_deref(), Some("connection error: 401 unauthorized"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let context = supervisor.context("ws-1").unwrap();
    assert_eq!(context.state, ConnectionState::Failed);
    assert_eq!(context.subscriptions_to_restore, book_subscriptions());
}

#[tokio::test(start_paused = true)]
async fn success_at_any_attempt_clears_context() {
    for failures in 0..3 {
        let notifier = RecordingNotifier::new();
        let supervisor = ConnectionSupervisor::new(policy(3), Arc::new(notifier.clone()), None);
        let reconnector = ScriptedReconnector::succeeding_after(failures);

        supervisor.handle_disconnect(
            "ws-1",
            "coinbase",
            "level2",
            "eof",
            reconnector.shared(),
            book_subscriptions(),
        );
        sleep(Duration::from_secs(120)).await;

        assert!(supervisor.context("ws-1").is_none(), "failures={failures}");
        assert_eq!(notifier.restorations_for("ws-1"), 1);
        let last = reconnector.calls().pop().unwrap();
        assert_eq!(last.request.subscriptions, book_subscriptions());
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_is_silent() {
    let notifier = RecordingNotifier::new();
    let supervisor = ConnectionSupervisor::new(policy(3), Arc::new(notifier.clone()), None);
    let reconnector = ScriptedReconnector::failing();

    supervisor.handle_disconnect(
        "ws-1",
        "coinbase",
        "level2",
        "eof",
        reconnector.shared(),
        Subscriptions::new(),
    );
    sleep(Duration::from_secs(4)).await;
    assert!(supervisor.cancel_reconnect("ws-1"));

    assert!(supervisor.context("ws-1").is_none());
    sleep(Duration::from_secs(120)).await;
    assert_eq!(notifier.failures_for("ws-1"), 0);
    assert_eq!(reconnector.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn handle_disconnect_never_blocks_caller() {
    let supervisor = ConnectionSupervisor::new(
        policy(3),
        Arc::new(RecordingNotifier::new()),
        None,
    );
    let reconnector = ScriptedReconnector::failing().with_latency(Duration::from_secs(30));
    let start = Instant::now();

    for n in 0..20 {
        supervisor.handle_disconnect(
            &format!("ws-{n}"),
            "binance",
            "depth",
            "eof",
            reconnector.shared(),
            Subscriptions::new(),
        );
    }

    assert_eq!(Instant::now(), start);
    assert_eq!(supervisor.get_reconnect_stats().active_reconnects, 20);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn registry_broadcasts_to_every_notifier() {
    let first = RecordingNotifier::new();
    let second = RecordingNotifier::new();
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(first.clone()));
    registry.register(Box::new(second.clone()));
    let supervisor = ConnectionSupervisor::new(policy(1), Arc::new(registry), None);

    supervisor.handle_disconnect(
        "ws-1",
        "okx",
        "books",
        "eof",
        ScriptedReconnector::failing().shared(),
        Subscriptions::new(),
    );
    sleep(Duration::from_secs(10)).await;

    assert_eq!(first.failures_for("ws-1"), 1);
    assert_eq!(second.failures_for("ws-1"), 1);
}
