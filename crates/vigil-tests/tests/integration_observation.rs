// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Observation Integration Tests
//!
//! End-to-end tests of the observation layer against the mock server:
//!
//! - Session setup and teardown through `ObservationContext`
//! - Subscription register / unregister lifecycle and accounting
//! - Ordered delivery and server-side queue overflow
//! - Polling, including halting on a failed read
//! - Live-server tests, ignored unless `VIGIL_TEST_ENDPOINT` is set
//!
//! ## Test Categories
//!
//! - `test_context_*`: Connection lifecycle
//! - `test_subscription_*`: Subscription manager
//! - `test_poll_*`: Poll tasks
//! - `test_live_*`: Real server

use std::sync::Arc;
use std::time::Duration;

use vigil_opcua::{
    ConnectionError, ObservationContext, ObservationSession, OpcUaError, OpcUaValue, PollExit,
    RegistrationError, SubscriptionState, ValueDispatcher,
};
use vigil_tests::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    provider: MockSessionProvider,
    session: Arc<MockSession>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new() -> Self {
        init_test_logging();
        let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
        Self {
            provider,
            session,
            sink: Arc::new(RecordingSink::new()),
        }
    }

    async fn connect(&self) -> ObservationContext<SharedMockSession> {
        let dispatcher = Arc::new(ValueDispatcher::new().with_sink(self.sink.clone()));
        ObservationContext::connect(&self.provider, &TargetFixtures::connection(), dispatcher)
            .await
            .expect("mock connection should succeed")
    }
}

// =============================================================================
// Context Tests
// =============================================================================

#[tokio::test]
async fn test_context_connect_uses_config() {
    let harness = Harness::new();
    let context = harness.connect().await;

    assert_eq!(harness.provider.connect_count(), 1);
    let config = harness.provider.last_config().unwrap();
    assert_eq!(config.endpoint, "opc.tcp://host:4840");
    assert_eq!(config.application_name, "OPCAPP");
    assert!(context.session().is_connected());

    context.close().await;
    assert_eq!(harness.session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_context_connect_refused() {
    let harness = Harness::new();
    harness.provider.fail_connection(true);

    let dispatcher = Arc::new(ValueDispatcher::new());
    let err = ObservationContext::connect(&harness.provider, &TargetFixtures::connection(), dispatcher)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OpcUaError::Connection(ConnectionError::Refused { .. })
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_context_close_swallows_disconnect_failure() {
    let harness = Harness::new();
    harness.session.fail_disconnect(true);

    let context = harness.connect().await;
    let exits = context.close().await;

    assert!(exits.is_empty());
    assert_eq!(harness.session.disconnect_count(), 1);
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_subscription_register_unregister_leaves_nothing() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());

    let report = manager.register().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.created.len(), 1);
    assert_eq!(manager.state(), SubscriptionState::Registered);
    assert_eq!(harness.session.active_subscriptions(), 1);
    assert_eq!(harness.session.monitored_item_count(), 1);

    assert!(manager.unregister().await);
    manager.wait_for_teardown().await;
    assert_eq!(manager.state(), SubscriptionState::Unregistered);
    assert_eq!(harness.session.active_subscriptions(), 0);
    assert_eq!(harness.session.subscriptions_deleted(), 1);

    context.close().await;
}

#[tokio::test(flavor = "current_thread")]
async fn test_subscription_register_logs_created_item() {
    let harness = Harness::new();
    let capture = LogCapture::new();
    let _guard = capture.set_default();

    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());
    manager.register().await.unwrap();

    assert_eq!(context.session().endpoint(), "opc.tcp://host:4840");
    assert!(
        capture.contains("item created for nodeId={ns=2;s=X.Y}"),
        "captured: {:?}",
        capture.messages()
    );
    let created = capture
        .events()
        .into_iter()
        .find(|e| e.message.starts_with("item created"))
        .unwrap();
    assert_eq!(created.level, tracing::Level::INFO);

    manager.unregister().await;
    manager.wait_for_teardown().await;
    context.close().await;
}

#[tokio::test]
async fn test_subscription_values_arrive_in_order() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());
    manager.register().await.unwrap();

    let target = TargetFixtures::target();
    for value in [1.0, 2.0, 3.0] {
        harness.session.record_change(&target, value);
    }
    assert_eq!(harness.session.publish(), 3);

    assert_eq!(
        harness.sink.values_for(&target),
        vec![
            OpcUaValue::Double(1.0),
            OpcUaValue::Double(2.0),
            OpcUaValue::Double(3.0)
        ]
    );
    assert_eq!(manager.stats().notifications(), 3);

    manager.unregister().await;
    manager.wait_for_teardown().await;
    context.close().await;
}

#[tokio::test]
async fn test_subscription_queue_overflow_drops_oldest() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let manager = context
        .subscription(TargetFixtures::target())
        .with_item_settings(SettingsFixtures::monitored_item(10));
    manager.register().await.unwrap();

    let target = TargetFixtures::target();
    for i in 1..=11 {
        harness.session.record_change(&target, OpcUaValue::Int32(i));
    }
    assert_eq!(harness.session.publish(), 10);

    let values = harness.sink.values();
    assert_eq!(values.len(), 10);
    assert_eq!(values.first(), Some(&OpcUaValue::Int32(2)));
    assert_eq!(values.last(), Some(&OpcUaValue::Int32(11)));

    manager.unregister().await;
    manager.wait_for_teardown().await;
    context.close().await;
}

#[tokio::test]
async fn test_subscription_double_unregister_is_noop() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());
    manager.register().await.unwrap();

    assert!(manager.unregister().await);
    assert!(!manager.unregister().await);
    manager.wait_for_teardown().await;
    assert_eq!(harness.session.subscriptions_deleted(), 1);
    assert_eq!(manager.stats().unregistrations(), 1);

    context.close().await;
}

#[tokio::test]
async fn test_subscription_register_twice_rejected() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());
    manager.register().await.unwrap();

    let err = manager.register().await.unwrap_err();
    assert!(matches!(
        err,
        OpcUaError::Registration(RegistrationError::AlreadyRegistered { .. })
    ));
    assert_eq!(harness.session.active_subscriptions(), 1);

    manager.unregister().await;
    manager.wait_for_teardown().await;
    context.close().await;
}

#[tokio::test]
async fn test_subscription_rejected_item_is_reported() {
    let harness = Harness::new();
    harness.session.reject_target(TargetFixtures::unknown_target());

    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::unknown_target());
    let report = manager.register().await.unwrap();

    assert!(!report.is_complete());
    assert!(report.created.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(manager.stats().items_failed(), 1);

    // The subscription itself exists and is released on unregister.
    assert_eq!(harness.session.active_subscriptions(), 1);
    assert!(manager.unregister().await);
    manager.wait_for_teardown().await;
    assert_eq!(harness.session.active_subscriptions(), 0);

    context.close().await;
}

#[tokio::test]
async fn test_subscription_item_request_failure_cleans_up() {
    let harness = Harness::new();
    harness.session.fail_create_items(true);

    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());
    let err = manager.register().await.unwrap_err();

    assert!(matches!(
        err,
        OpcUaError::Registration(RegistrationError::RequestFailed { .. })
    ));
    assert_eq!(manager.state(), SubscriptionState::Unregistered);
    assert_eq!(harness.session.active_subscriptions(), 0);

    context.close().await;
}

#[tokio::test]
async fn test_subscription_teardown_failure_still_unregisters() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::target());
    manager.register().await.unwrap();

    harness.session.fail_delete(true);
    assert!(manager.unregister().await);
    manager.wait_for_teardown().await;
    assert_eq!(manager.state(), SubscriptionState::Unregistered);
    assert_eq!(manager.stats().teardown_failures(), 1);

    // The server kept the subscription; its late publishes must not surface.
    let target = TargetFixtures::target();
    harness.session.record_change(&target, 99.0);
    assert_eq!(harness.session.publish(), 1);
    assert!(harness.sink.is_empty());

    context.close().await;
}

#[tokio::test]
async fn test_subscription_handles_are_unique_per_session() {
    let harness = Harness::new();
    let context = harness.connect().await;

    let first = context.subscription(TargetFixtures::target());
    let second = context.subscription(TargetFixtures::other_target());
    first.register().await.unwrap();
    second.register().await.unwrap();

    let handles = harness.session.client_handles();
    assert_eq!(handles.len(), 2);
    assert_ne!(handles[0], handles[1]);

    harness.session.notify(&TargetFixtures::other_target(), 5.0);
    assert_eq!(
        harness.sink.values_for(&TargetFixtures::other_target()),
        vec![OpcUaValue::Double(5.0)]
    );
    assert!(harness.sink.values_for(&TargetFixtures::target()).is_empty());

    first.unregister().await;
    second.unregister().await;
    second.wait_for_teardown().await;
    first.wait_for_teardown().await;
    context.close().await;
}

#[tokio::test]
async fn test_subscription_settings_reach_server() {
    let harness = Harness::new();
    let context = harness.connect().await;
    let settings = vigil_opcua::SubscriptionSettings::with_interval(Duration::from_millis(500));
    let manager = context
        .subscription(TargetFixtures::target())
        .with_subscription_settings(settings.clone());

    let report = manager.register().await.unwrap();
    assert_eq!(
        harness.session.subscription_settings(report.subscription_id),
        Some(settings)
    );

    manager.unregister().await;
    manager.wait_for_teardown().await;
    context.close().await;
}

// =============================================================================
// Poll Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_poll_delivers_single_read() {
    let harness = Harness::new();
    let sample = SampleFixtures::good(42.0);
    harness.session.set_sample(TargetFixtures::target(), sample.clone());

    let context = harness.connect().await;
    let id = context
        .schedule_poll(TargetFixtures::target(), SettingsFixtures::default_poll())
        .unwrap();

    assert!(harness.sink.wait_for(1, Duration::from_millis(500)).await);
    let exit = context.remove_poll(id).await.unwrap();

    assert!(!exit.is_failed());
    assert_eq!(exit.ticks(), 1);
    assert_eq!(
        harness.sink.records(),
        vec![(TargetFixtures::target(), sample)]
    );
    assert_eq!(harness.session.read_count(), 1);

    context.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_reads_once_per_period() {
    let harness = Harness::new();
    harness.session.set_value(TargetFixtures::target(), 1.5);

    let context = harness.connect().await;
    let id = context
        .schedule_poll(TargetFixtures::target(), SettingsFixtures::poll_every(100))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(450)).await;
    let exit = context.remove_poll(id).await.unwrap();

    // Ticks at 0, 100, 200, 300 and 400 ms.
    assert_eq!(exit.ticks(), 5);
    assert_eq!(harness.sink.len(), 5);

    context.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_halts_on_failed_read() {
    let harness = Harness::new();
    harness.session.set_value(TargetFixtures::target(), 1.0);

    let context = harness.connect().await;
    let id = context
        .schedule_poll(TargetFixtures::target(), SettingsFixtures::poll_every(100))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    harness.session.fail_next_read();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!context.scheduler().is_running(id));
    match context.remove_poll(id).await {
        Some(PollExit::Failed { ticks, error }) => {
            assert_eq!(ticks, 3);
            assert!(matches!(error, OpcUaError::Read(_)));
        }
        other => panic!("expected a failed exit, got {other:?}"),
    }
    assert_eq!(harness.sink.len(), 2);

    context.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_halts_on_bad_status() {
    let harness = Harness::new();

    let context = harness.connect().await;
    let id = context
        .schedule_poll(TargetFixtures::unknown_target(), SettingsFixtures::default_poll())
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let exit = context.remove_poll(id).await.unwrap();

    assert!(exit.is_failed());
    assert!(harness.sink.is_empty());

    context.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_slow_read_times_out() {
    let harness = Harness::new();
    harness.session.set_value(TargetFixtures::target(), 1.0);
    harness.session.set_read_latency(Duration::from_secs(10));

    let context = harness.connect().await;
    let settings = SettingsFixtures::default_poll().with_read_timeout(Duration::from_secs(2));
    let id = context.schedule_poll(TargetFixtures::target(), settings).unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    let exit = context.remove_poll(id).await.unwrap();

    assert!(exit.is_failed());
    assert!(harness.sink.is_empty());

    context.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_and_subscription_share_dispatcher() {
    let harness = Harness::new();
    harness.session.set_value(TargetFixtures::target(), 10.0);

    let context = harness.connect().await;
    let manager = context.subscription(TargetFixtures::other_target());
    manager.register().await.unwrap();
    let id = context
        .schedule_poll(TargetFixtures::target(), SettingsFixtures::default_poll())
        .unwrap();

    assert!(harness.sink.wait_for(1, Duration::from_millis(500)).await);
    harness.session.notify(&TargetFixtures::other_target(), 20.0);

    assert_eq!(harness.sink.len(), 2);
    assert_eq!(
        harness.sink.values_for(&TargetFixtures::other_target()),
        vec![OpcUaValue::Double(20.0)]
    );

    context.remove_poll(id).await;
    manager.unregister().await;
    manager.wait_for_teardown().await;
    context.close().await;
    assert_eq!(harness.session.active_subscriptions(), 0);
}

// =============================================================================
// Live Server Tests
// =============================================================================

fn live_endpoint() -> String {
    std::env::var("VIGIL_TEST_ENDPOINT").unwrap_or_else(|_| "opc.tcp://localhost:4840".to_string())
}

fn live_target() -> vigil_opcua::VariableReference {
    std::env::var("VIGIL_TEST_TARGET")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| vigil_config::DEFAULT_TARGET.parse().unwrap())
}

#[tokio::test]
#[ignore = "requires an OPC UA server at VIGIL_TEST_ENDPOINT"]
async fn test_live_read() {
    init_test_logging();
    let provider = vigil_opcua::RealSessionProvider::new();
    let config = vigil_opcua::OpcUaConfig::new(live_endpoint());
    let sink = Arc::new(RecordingSink::new());
    let dispatcher = Arc::new(ValueDispatcher::new().with_sink(sink.clone()));

    let context = ObservationContext::connect(&provider, &config, dispatcher)
        .await
        .unwrap();
    let id = context
        .schedule_poll(live_target(), SettingsFixtures::default_poll())
        .unwrap();

    assert!(sink.wait_for(1, Duration::from_secs(5)).await);
    context.remove_poll(id).await;
    context.close().await;
}

#[tokio::test]
#[ignore = "requires an OPC UA server at VIGIL_TEST_ENDPOINT"]
async fn test_live_subscription_lifecycle() {
    init_test_logging();
    let provider = vigil_opcua::RealSessionProvider::new();
    let config = vigil_opcua::OpcUaConfig::new(live_endpoint());
    let context = ObservationContext::connect(&provider, &config, Arc::new(ValueDispatcher::new()))
        .await
        .unwrap();

    let manager = context.subscription(live_target());
    let report = manager.register().await.unwrap();
    assert!(report.is_complete());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(manager.unregister().await);
    assert!(!manager.unregister().await);
    manager.wait_for_teardown().await;
    context.close().await;
}
