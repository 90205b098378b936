//! Tests for the shared bridge lifecycle.
//!
//! Covers once-only creation under concurrency and caller drop, member
//! tracking, announcements on enter/leave, and teardown on destroy,
//! cancellation and closed streams.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use cc_test_utils::{fixtures, DriverCall, MockDriver, Operation};
use conference_controller::actors::{
    handle_new_call, BridgeHandle, BridgeRegistry, BridgeSettings, BridgeState, CallSettings,
    SessionOutcome,
};
use conference_controller::driver::Driver;
use conference_controller::errors::CcError;
use conference_controller::events::EventKind;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

const BRIDGE_KINDS: [EventKind; 3] = [
    EventKind::BridgeDestroyed,
    EventKind::ChannelEnteredBridge,
    EventKind::ChannelLeftBridge,
];

struct Harness {
    mock: Arc<MockDriver>,
    driver: Arc<dyn Driver>,
    registry: Arc<BridgeRegistry>,
    cancel_token: CancellationToken,
}

impl Harness {
    fn new(mock: Arc<MockDriver>) -> Self {
        let driver: Arc<dyn Driver> = mock.clone();
        Self {
            mock,
            driver,
            registry: Arc::new(BridgeRegistry::new(BridgeSettings::default())),
            cancel_token: CancellationToken::new(),
        }
    }

    async fn ensure(&self, channel_id: &str) -> Result<BridgeHandle, CcError> {
        self.registry
            .ensure_bridge(
                &self.driver,
                &fixtures::channel(channel_id),
                &self.cancel_token,
            )
            .await
    }

    async fn wait_deleted(&self, handle: &BridgeHandle) {
        tokio::time::timeout(WAIT, handle.wait_until_deleted())
            .await
            .expect("bridge should reach Deleted");
    }

    /// The single delete went out after every bridge subscription closed.
    fn assert_deleted_after_release(&self, handle: &BridgeHandle) {
        assert_eq!(
            self.mock.calls_of(Operation::DeleteBridge),
            vec![DriverCall::DeleteBridge {
                bridge: handle.key().id.clone(),
                live_subscriptions: 0,
            }]
        );
    }

    fn assert_subscriptions_released(&self) {
        for kind in BRIDGE_KINDS {
            assert_eq!(
                self.mock.active_subscriptions(kind),
                0,
                "{kind} subscription should be released"
            );
        }
    }
}

fn members(handle: &BridgeHandle) -> Vec<String> {
    handle.members().into_iter().collect()
}

fn plays(mock: &MockDriver) -> Vec<String> {
    mock.calls_of(Operation::Play)
        .into_iter()
        .map(|call| match call {
            DriverCall::Play { media, .. } => media,
            other => panic!("unexpected call: {other:?}"),
        })
        .collect()
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ensure_creates_exactly_once() {
    let harness = Arc::new(Harness::new(
        MockDriver::builder()
            .with_create_delay(Duration::from_millis(50))
            .build(),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move { harness.ensure(&format!("C{i}")).await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        let handle = task.await.unwrap().expect("ensure_bridge should succeed");
        ids.push(handle.key().id.clone());
    }

    assert_eq!(harness.mock.count(Operation::CreateBridge), 1);
    ids.dedup();
    assert_eq!(ids.len(), 1, "all callers share one bridge");
    for kind in BRIDGE_KINDS {
        assert_eq!(harness.mock.active_subscriptions(kind), 1);
    }
}

#[tokio::test]
async fn test_dropped_caller_does_not_abandon_creation() {
    let harness = Harness::new(
        MockDriver::builder()
            .with_create_delay(Duration::from_millis(100))
            .build(),
    );

    // The create request reaches the backend, then the caller gives up
    let first = tokio::time::timeout(Duration::from_millis(20), harness.ensure("C1")).await;
    assert!(first.is_err(), "first ensure should time out mid-creation");
    assert_eq!(harness.mock.count(Operation::CreateBridge), 1);

    // The creation finishes on its own and is handed to the next caller
    let handle = harness.ensure("C2").await.expect("bridge is published");
    assert_eq!(handle.state(), BridgeState::Listening);
    assert_eq!(harness.mock.count(Operation::CreateBridge), 1);
    assert_eq!(harness.mock.count(Operation::DeleteBridge), 0);

    let current = harness.registry.current().await.expect("bridge in registry");
    assert_eq!(current.key(), handle.key());
    for kind in BRIDGE_KINDS {
        assert_eq!(harness.mock.active_subscriptions(kind), 1);
    }
}

#[tokio::test]
async fn test_manager_listening_before_handle_returned() {
    let harness = Harness::new(MockDriver::builder().build());

    let handle = harness.ensure("C1").await.unwrap();

    // No waiting: the subscriptions exist by the time ensure_bridge returns
    assert_eq!(handle.state(), BridgeState::Listening);
    for kind in BRIDGE_KINDS {
        assert_eq!(harness.mock.active_subscriptions(kind), 1);
    }
    assert_eq!(
        harness.mock.emit(fixtures::channel_entered(handle.key(), "C1")),
        1
    );
}

#[tokio::test]
async fn test_bridge_created_as_mixing_with_name_equal_to_id() {
    let harness = Harness::new(MockDriver::builder().build());

    let handle = harness.ensure("C1").await.unwrap();

    match harness.mock.calls_of(Operation::CreateBridge).as_slice() {
        [DriverCall::CreateBridge {
            bridge,
            bridge_type,
            name,
        }] => {
            assert_eq!(bridge_type, "mixing");
            assert_eq!(name, bridge);
            assert_eq!(bridge, &handle.key().id);
            assert!(bridge.starts_with("br-"));
        }
        other => panic!("unexpected create calls: {other:?}"),
    }
}

#[tokio::test]
async fn test_creation_failure_leaves_registry_empty_for_retry() {
    let harness = Harness::new(
        MockDriver::builder()
            .failing_times(Operation::CreateBridge, 1)
            .build(),
    );

    let err = harness.ensure("C1").await.expect_err("first create fails");
    assert!(matches!(err, CcError::BridgeCreation(_)));
    assert!(harness.registry.current().await.is_none());
    harness.assert_subscriptions_released();

    let handle = harness.ensure("C2").await.expect("retry should create");
    assert_eq!(handle.state(), BridgeState::Listening);
    assert_eq!(harness.mock.count(Operation::CreateBridge), 2);
}

// ============================================================================
// Members
// ============================================================================

#[tokio::test]
async fn test_members_follow_adds_and_leaves() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();
    assert!(handle.members().is_empty());

    for id in ["C1", "C2"] {
        let outcome = handle_new_call(
            Arc::clone(&harness.driver),
            Arc::clone(&harness.registry),
            Arc::new(CallSettings::default()),
            fixtures::channel(id),
            harness.cancel_token.clone(),
        )
        .await;
        assert!(matches!(outcome, SessionOutcome::Bridged(_)));
    }
    assert_eq!(members(&handle), vec!["C1", "C2"]);

    // The leave is applied before its announcement is requested
    harness.mock.emit(fixtures::channel_left(handle.key(), "C1"));
    assert!(
        harness
            .mock
            .wait_for_calls(Operation::Play, 1, WAIT)
            .await
    );
    assert_eq!(members(&handle), vec!["C2"]);

    // An empty bridge stays up
    harness.mock.emit(fixtures::channel_left(handle.key(), "C2"));
    assert!(
        harness
            .mock
            .wait_for_calls(Operation::Play, 2, WAIT)
            .await
    );
    assert!(handle.members().is_empty());
    assert_eq!(handle.state(), BridgeState::Listening);
    assert_eq!(harness.mock.count(Operation::DeleteBridge), 0);
}

#[tokio::test]
async fn test_failed_add_is_not_a_member_and_teardown_clears() {
    let harness = Harness::new(
        MockDriver::builder()
            .failing_times(Operation::AddChannel, 1)
            .build(),
    );

    let call = |id: &'static str| {
        handle_new_call(
            Arc::clone(&harness.driver),
            Arc::clone(&harness.registry),
            Arc::new(CallSettings::default()),
            fixtures::channel(id),
            harness.cancel_token.clone(),
        )
    };

    assert!(matches!(
        call("C1").await,
        SessionOutcome::AddChannelFailed(_)
    ));
    assert!(matches!(call("C2").await, SessionOutcome::Bridged(_)));

    let handle = harness.registry.current().await.expect("bridge created");
    assert_eq!(members(&handle), vec!["C2"]);

    harness.mock.emit(fixtures::bridge_destroyed(handle.key()));
    harness.wait_deleted(&handle).await;
    assert!(handle.members().is_empty());
}

// ============================================================================
// Announcements
// ============================================================================

#[tokio::test]
async fn test_join_and_leave_announcements() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();

    harness
        .mock
        .emit(fixtures::channel_entered(handle.key(), "C1"));
    assert!(
        harness
            .mock
            .wait_for_calls(Operation::Play, 1, WAIT)
            .await
    );

    harness.mock.emit(fixtures::channel_left(handle.key(), "C1"));
    assert!(
        harness
            .mock
            .wait_for_calls(Operation::Play, 2, WAIT)
            .await
    );

    // No extra playbacks trail behind
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        plays(&harness.mock),
        vec!["sound:confbridge-join", "sound:confbridge-leave"]
    );
}

#[tokio::test]
async fn test_events_for_other_bridges_ignored() {
    let harness = Harness::new(MockDriver::builder().build());
    let _handle = harness.ensure("C1").await.unwrap();

    let other = common::types::ResourceKey::bridge("br-other");
    assert_eq!(harness.mock.emit(fixtures::channel_entered(&other, "C9")), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.mock.count(Operation::Play), 0);
}

#[tokio::test]
async fn test_playback_failure_keeps_bridge_listening() {
    let harness = Harness::new(MockDriver::builder().failing(Operation::Play).build());
    let handle = harness.ensure("C1").await.unwrap();

    harness
        .mock
        .emit(fixtures::channel_entered(handle.key(), "C1"));
    assert!(
        harness
            .mock
            .wait_for_calls(Operation::Play, 1, WAIT)
            .await
    );
    assert_eq!(handle.state(), BridgeState::Listening);

    harness.mock.emit(fixtures::channel_left(handle.key(), "C1"));
    assert!(
        harness
            .mock
            .wait_for_calls(Operation::Play, 2, WAIT)
            .await
    );
    assert_eq!(harness.mock.count(Operation::DeleteBridge), 0);
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_destroyed_event_tears_down_once() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();

    harness.mock.emit(fixtures::bridge_destroyed(handle.key()));
    harness.wait_deleted(&handle).await;

    harness.assert_subscriptions_released();
    harness.assert_deleted_after_release(&handle);

    // Nothing is listening any more
    assert_eq!(
        harness
            .mock
            .emit(fixtures::channel_entered(handle.key(), "C2")),
        0
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.mock.count(Operation::Play), 0);
    assert_eq!(harness.mock.count(Operation::DeleteBridge), 1);
}

#[tokio::test]
async fn test_terminated_bridge_is_not_recreated() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();

    harness.mock.emit(fixtures::bridge_destroyed(handle.key()));
    harness.wait_deleted(&handle).await;

    let err = harness.ensure("C2").await.expect_err("bridge is gone");
    assert!(matches!(err, CcError::BridgeTerminated(id) if id == handle.key().id));
    assert_eq!(harness.mock.count(Operation::CreateBridge), 1);
}

#[tokio::test]
async fn test_cancellation_tears_down() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();

    harness.cancel_token.cancel();
    harness.wait_deleted(&handle).await;

    harness.assert_subscriptions_released();
    harness.assert_deleted_after_release(&handle);
    assert_eq!(harness.mock.count(Operation::Play), 0);
}

#[tokio::test]
async fn test_closed_event_stream_tears_down() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();

    harness
        .mock
        .close_subscriptions(EventKind::ChannelLeftBridge);
    harness.wait_deleted(&handle).await;

    harness.assert_subscriptions_released();
    harness.assert_deleted_after_release(&handle);
}

#[tokio::test]
async fn test_delete_failure_still_completes_teardown() {
    let harness = Harness::new(
        MockDriver::builder()
            .failing(Operation::DeleteBridge)
            .build(),
    );
    let handle = harness.ensure("C1").await.unwrap();

    harness.cancel_token.cancel();
    harness.wait_deleted(&handle).await;

    // Issued once, not retried
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.mock.count(Operation::DeleteBridge), 1);
}

#[tokio::test]
async fn test_shutdown_waits_for_manager() {
    let harness = Harness::new(MockDriver::builder().build());
    let handle = harness.ensure("C1").await.unwrap();

    harness.cancel_token.cancel();
    harness.registry.shutdown(WAIT).await;

    assert_eq!(handle.state(), BridgeState::Deleted);
    assert_eq!(harness.mock.count(Operation::DeleteBridge), 1);

    // Second shutdown has nothing left to wait for
    harness.registry.shutdown(Duration::from_millis(10)).await;
}
