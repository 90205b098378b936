//! In-memory telephony driver.
//!
//! `MockDriver` records every driver call, fails the operations it was told
//! to fail and runs a small event bus: tests `emit` events and every live
//! subscription whose kind and filter match receives them.
//!
//! # Example
//!
//! ```rust,ignore
//! use cc_test_utils::{MockDriver, Operation};
//!
//! let driver = MockDriver::builder()
//!     .failing(Operation::Dial)
//!     .with_bridge_id("B-auto")
//!     .build();
//!
//! // ... run the code under test with `driver.clone()` as `Arc<dyn Driver>`
//!
//! assert_eq!(driver.count(Operation::CreateBridge), 1);
//! ```

use common::origination::OriginateRequest;
use common::types::{ResourceKey, ResourceKind};
use conference_controller::driver::{Driver, DriverError, Subscription};
use conference_controller::events::{Event, EventKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Driver operation, used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Answer,
    Dial,
    CreateBridge,
    AddChannel,
    DeleteBridge,
    Play,
    Originate,
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Answer {
        channel: String,
    },
    Dial {
        channel: String,
        caller: String,
        ring_timeout: Duration,
    },
    CreateBridge {
        bridge: String,
        bridge_type: String,
        name: String,
    },
    AddChannel {
        bridge: String,
        channel: String,
    },
    /// `live_subscriptions` counts the subscriptions scoped to this bridge
    /// that were still open when the delete was issued.
    DeleteBridge {
        bridge: String,
        live_subscriptions: usize,
    },
    Play {
        bridge: String,
        media: String,
    },
    Originate {
        endpoint: String,
    },
}

impl DriverCall {
    /// The operation this call invoked.
    pub fn operation(&self) -> Operation {
        match self {
            DriverCall::Answer { .. } => Operation::Answer,
            DriverCall::Dial { .. } => Operation::Dial,
            DriverCall::CreateBridge { .. } => Operation::CreateBridge,
            DriverCall::AddChannel { .. } => Operation::AddChannel,
            DriverCall::DeleteBridge { .. } => Operation::DeleteBridge,
            DriverCall::Play { .. } => Operation::Play,
            DriverCall::Originate { .. } => Operation::Originate,
        }
    }
}

/// How often an operation should fail.
#[derive(Debug, Clone, Copy)]
enum Failure {
    Always,
    Times(usize),
}

struct Registration {
    kind: EventKind,
    filter: Option<ResourceKey>,
    sender: mpsc::UnboundedSender<Event>,
    cancel_token: CancellationToken,
}

impl Registration {
    fn is_live(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.sender.is_closed()
    }
}

#[derive(Default)]
struct MockDriverInner {
    calls: Vec<DriverCall>,
    failures: HashMap<Operation, Failure>,
    registrations: Vec<Registration>,
}

/// Mock implementation of [`Driver`].
#[derive(Clone)]
pub struct MockDriver {
    inner: Arc<Mutex<MockDriverInner>>,
    bridge_id: Option<String>,
    create_delay: Option<Duration>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver where every operation succeeds.
    pub fn new() -> Self {
        Self::builder().build_driver()
    }

    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::default()
    }

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls of one operation, in order.
    pub fn calls_of(&self, operation: Operation) -> Vec<DriverCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation() == operation)
            .collect()
    }

    /// Number of calls of one operation.
    pub fn count(&self, operation: Operation) -> usize {
        self.calls_of(operation).len()
    }

    /// Make `operation` fail from now on.
    pub fn fail(&self, operation: Operation) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(operation, Failure::Always);
    }

    /// Stop failing `operation`.
    pub fn heal(&self, operation: Operation) {
        self.inner.lock().unwrap().failures.remove(&operation);
    }

    /// Deliver `event` to every live matching subscription.
    ///
    /// Returns how many subscriptions received it.
    pub fn emit(&self, event: Event) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.registrations.retain(Registration::is_live);

        inner
            .registrations
            .iter()
            .filter(|r| r.kind == event.kind() && event.matches(r.filter.as_ref()))
            .filter(|r| r.sender.send(event.clone()).is_ok())
            .count()
    }

    /// Number of live subscriptions of `kind`.
    pub fn active_subscriptions(&self, kind: EventKind) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.registrations.retain(Registration::is_live);
        inner.registrations.iter().filter(|r| r.kind == kind).count()
    }

    /// Number of live subscriptions filtered on `key`, of any kind.
    pub fn subscriptions_on(&self, key: &ResourceKey) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.registrations.retain(Registration::is_live);
        inner
            .registrations
            .iter()
            .filter(|r| r.filter.as_ref().is_some_and(|f| f.same_resource(key)))
            .count()
    }

    /// Close the bus side of every subscription of `kind`.
    ///
    /// Subscribers see their stream end, as when the backend connection drops.
    pub fn close_subscriptions(&self, kind: EventKind) {
        self.inner
            .lock()
            .unwrap()
            .registrations
            .retain(|r| r.kind != kind);
    }

    /// Poll until `count(operation) >= expected` or `timeout` elapses.
    pub async fn wait_for_calls(
        &self,
        operation: Operation,
        expected: usize,
        timeout: Duration,
    ) -> bool {
        self.wait_until(timeout, || self.count(operation) >= expected)
            .await
    }

    /// Poll until `active_subscriptions(kind) == expected` or `timeout` elapses.
    pub async fn wait_for_subscriptions(
        &self,
        kind: EventKind,
        expected: usize,
        timeout: Duration,
    ) -> bool {
        self.wait_until(timeout, || self.active_subscriptions(kind) == expected)
            .await
    }

    async fn wait_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Record `call`, then apply any injected failure.
    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        let operation = call.operation();
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);

        let fail = match inner.failures.get(&operation).copied() {
            None => false,
            Some(Failure::Always) => true,
            Some(Failure::Times(1)) => {
                inner.failures.remove(&operation);
                true
            }
            Some(Failure::Times(n)) => {
                inner.failures.insert(operation, Failure::Times(n - 1));
                true
            }
        };

        if fail {
            Err(DriverError::Rejected(format!("injected {operation:?} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn answer(&self, channel: &ResourceKey) -> Result<(), DriverError> {
        self.record(DriverCall::Answer {
            channel: channel.id.clone(),
        })
    }

    async fn dial(
        &self,
        channel: &ResourceKey,
        caller: &str,
        ring_timeout: Duration,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::Dial {
            channel: channel.id.clone(),
            caller: caller.to_string(),
            ring_timeout,
        })
    }

    async fn create_bridge(
        &self,
        bridge: &ResourceKey,
        bridge_type: &str,
        name: &str,
    ) -> Result<ResourceKey, DriverError> {
        let recorded = self.record(DriverCall::CreateBridge {
            bridge: bridge.id.clone(),
            bridge_type: bridge_type.to_string(),
            name: name.to_string(),
        });

        // The backend has seen the request; only the reply is slow
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        recorded?;

        Ok(match &self.bridge_id {
            Some(id) => bridge.derive(ResourceKind::Bridge, id.clone()),
            None => bridge.clone(),
        })
    }

    async fn add_channel(
        &self,
        bridge: &ResourceKey,
        channel: &ResourceKey,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::AddChannel {
            bridge: bridge.id.clone(),
            channel: channel.id.clone(),
        })
    }

    async fn delete_bridge(&self, bridge: &ResourceKey) -> Result<(), DriverError> {
        let live_subscriptions = self.subscriptions_on(bridge);
        self.record(DriverCall::DeleteBridge {
            bridge: bridge.id.clone(),
            live_subscriptions,
        })
    }

    async fn play(
        &self,
        bridge: &ResourceKey,
        media_uri: &str,
        _cancel_token: &CancellationToken,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::Play {
            bridge: bridge.id.clone(),
            media: media_uri.to_string(),
        })
    }

    async fn originate(
        &self,
        scope: &ResourceKey,
        request: &OriginateRequest,
    ) -> Result<ResourceKey, DriverError> {
        request.validate()?;

        self.record(DriverCall::Originate {
            endpoint: request.endpoint.clone(),
        })?;

        let id = if request.channel_id.is_empty() {
            ResourceKey::generate_id(ResourceKind::Channel)
        } else {
            request.channel_id.clone()
        };
        Ok(scope.derive(ResourceKind::Channel, id))
    }

    fn subscribe(&self, key: Option<&ResourceKey>, kind: EventKind) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        self.inner.lock().unwrap().registrations.push(Registration {
            kind,
            filter: key.cloned(),
            sender,
            cancel_token: cancel_token.clone(),
        });

        Subscription::new(kind, receiver, cancel_token)
    }
}

/// Builder for [`MockDriver`].
#[derive(Debug, Default)]
pub struct MockDriverBuilder {
    failures: HashMap<Operation, Failure>,
    bridge_id: Option<String>,
    create_delay: Option<Duration>,
}

impl MockDriverBuilder {
    /// Fail every call of `operation`.
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failures.insert(operation, Failure::Always);
        self
    }

    /// Fail the first `times` calls of `operation`.
    pub fn failing_times(mut self, operation: Operation, times: usize) -> Self {
        if times > 0 {
            self.failures.insert(operation, Failure::Times(times));
        }
        self
    }

    /// Return this id from `create_bridge` instead of the requested one.
    pub fn with_bridge_id(mut self, id: impl Into<String>) -> Self {
        self.bridge_id = Some(id.into());
        self
    }

    /// Sleep after recording `create_bridge`, before returning its result.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Build a shared driver.
    pub fn build(self) -> Arc<MockDriver> {
        Arc::new(self.build_driver())
    }

    fn build_driver(self) -> MockDriver {
        MockDriver {
            inner: Arc::new(Mutex::new(MockDriverInner {
                failures: self.failures,
                ..MockDriverInner::default()
            })),
            bridge_id: self.bridge_id,
            create_delay: self.create_delay,
        }
    }
}
