//! Shared mixing bridge lifecycle.
//!
//! The process owns at most one mixing bridge. [`BridgeRegistry`] creates it
//! on first need and hands every caller the same [`BridgeHandle`]; a
//! [`BridgeManager`] task, started before the handle is published, listens
//! for the bridge's destroy/enter/leave events, plays announcements and
//! tears the bridge down.
//!
//! # State Machine
//!
//! ```text
//! (no bridge) --create + manager listening--> Listening
//! Listening --cancel | destroyed | stream closed--> Terminating
//! Terminating --subscriptions cancelled, delete issued--> Deleted
//! ```
//!
//! Creation and manager startup run in a task that owns the registry lock,
//! so concurrent `ensure_bridge` callers queue behind the first one and only
//! ever observe "no bridge" or a bridge whose manager is already listening.
//! A caller dropped mid-startup does not abandon the creation: the task
//! still publishes the bridge for whoever asks next. A failed creation
//! leaves the slot empty for the next caller to retry.
//!
//! # Members
//!
//! The handle tracks which call legs are in the bridge: sessions add a leg
//! after a successful add-channel, the manager removes it on a leave event
//! and clears the set on teardown. Membership is informational; an empty
//! bridge is not torn down.

use crate::driver::Driver;
use crate::errors::CcError;
use crate::events::{Event, EventKind};
use crate::observability::metrics;

use common::types::{ResourceKey, ResourceKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Default bridge type requested from the driver.
pub const DEFAULT_BRIDGE_TYPE: &str = "mixing";

/// Default announcement played when a channel enters the bridge.
pub const DEFAULT_JOIN_SOUND: &str = "sound:confbridge-join";

/// Default announcement played when a channel leaves the bridge.
pub const DEFAULT_LEAVE_SOUND: &str = "sound:confbridge-leave";

/// How the shared bridge is created and announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Bridge type passed to `create_bridge`.
    pub bridge_type: String,
    /// Media URI played on channel enter.
    pub join_sound: String,
    /// Media URI played on channel leave.
    pub leave_sound: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            bridge_type: DEFAULT_BRIDGE_TYPE.to_string(),
            join_sound: DEFAULT_JOIN_SOUND.to_string(),
            leave_sound: DEFAULT_LEAVE_SOUND.to_string(),
        }
    }
}

/// Lifecycle state of a published bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Created, manager subscribed to all bridge events.
    Listening,
    /// Manager is leaving its event loop and releasing resources.
    Terminating,
    /// Subscriptions released and delete issued.
    Deleted,
}

type Members = Arc<watch::Sender<BTreeSet<String>>>;

/// Cloneable view of the shared bridge.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    key: ResourceKey,
    state: watch::Receiver<BridgeState>,
    members: Members,
}

impl BridgeHandle {
    fn new(key: ResourceKey, state: watch::Receiver<BridgeState>, members: Members) -> Self {
        Self {
            key,
            state,
            members,
        }
    }

    /// Key of the bridge as returned by the driver.
    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Channel ids of the call legs currently in the bridge.
    #[must_use]
    pub fn members(&self) -> BTreeSet<String> {
        self.members.borrow().clone()
    }

    /// Record a call leg that was added to the bridge.
    ///
    /// Ignored once the bridge has left `Listening`.
    pub(crate) fn add_member(&self, channel: &ResourceKey) {
        let listening = self.state() == BridgeState::Listening;
        self.members
            .send_if_modified(|members| listening && members.insert(channel.id.clone()));
    }

    /// Wait until the manager has finished tearing the bridge down.
    pub async fn wait_until_deleted(&self) {
        let mut state = self.state.clone();
        // An Err means the manager is gone, which only happens after Deleted.
        let _ = state.wait_for(|s| *s == BridgeState::Deleted).await;
    }
}

/// Published bridge plus the manager task driving it.
struct ManagedBridge {
    handle: BridgeHandle,
    task_handle: Option<JoinHandle<()>>,
}

/// Owner of the single shared bridge.
///
/// Created by the dispatcher and shared by reference with every call session.
pub struct BridgeRegistry {
    settings: BridgeSettings,
    slot: Arc<Mutex<Option<ManagedBridge>>>,
}

impl BridgeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(settings: BridgeSettings) -> Self {
        Self {
            settings,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Settings used for bridge creation and announcements.
    #[must_use]
    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// The published bridge, if one has been created.
    ///
    /// Blocks while a creation is in progress.
    pub async fn current(&self) -> Option<BridgeHandle> {
        self.slot.lock().await.as_ref().map(|b| b.handle.clone())
    }

    /// Return the shared bridge, creating it on first use.
    ///
    /// The bridge key is derived from `seed` (same node, dialog and app, fresh
    /// bridge id). The returned handle's manager is already subscribed to the
    /// bridge's destroy, enter and leave events.
    ///
    /// Cancel safe: if this future is dropped while the bridge is being
    /// created, the creation still completes and the bridge is published.
    ///
    /// # Errors
    ///
    /// - `CcError::BridgeCreation` if the driver fails to create the bridge;
    ///   the registry stays empty so a later call may retry.
    /// - `CcError::BridgeTerminated` if the bridge was already torn down.
    /// - `CcError::Internal` if the manager task died before listening.
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn ensure_bridge(
        &self,
        driver: &Arc<dyn Driver>,
        seed: &ResourceKey,
        cancel_token: &CancellationToken,
    ) -> Result<BridgeHandle, CcError> {
        let mut slot = Arc::clone(&self.slot).lock_owned().await;

        if let Some(existing) = slot.as_ref() {
            return match existing.handle.state() {
                BridgeState::Listening => {
                    debug!(
                        target: "cc.actor.bridge",
                        bridge_id = %existing.handle.key.id,
                        "Bridge already exists"
                    );
                    Ok(existing.handle.clone())
                }
                BridgeState::Terminating | BridgeState::Deleted => Err(
                    CcError::BridgeTerminated(existing.handle.key.id.clone()),
                ),
            };
        }

        let startup = start_bridge(
            Arc::clone(driver),
            seed.clone(),
            self.settings.clone(),
            cancel_token.clone(),
        );

        // The slot guard moves into the task and is released only once the
        // slot holds a listening bridge or the creation has failed.
        let creation = tokio::spawn(
            async move {
                let managed = startup.await?;
                let handle = managed.handle.clone();
                *slot = Some(managed);
                Ok::<_, CcError>(handle)
            }
            .in_current_span(),
        );

        creation
            .await
            .map_err(|e| CcError::Internal(format!("bridge startup task failed: {e}")))?
    }

    /// Wait for the bridge manager to finish its teardown.
    ///
    /// Only returns early if the manager has already been cancelled or the
    /// bridge destroyed; callers cancel the process token first.
    pub async fn shutdown(&self, timeout: Duration) {
        let task_handle = {
            let mut slot = self.slot.lock().await;
            slot.as_mut().and_then(|b| b.task_handle.take())
        };

        let Some(task_handle) = task_handle else {
            return;
        };

        match tokio::time::timeout(timeout, task_handle).await {
            Ok(Ok(())) => {
                debug!(
                    target: "cc.actor.bridge",
                    "Bridge manager completed cleanly"
                );
            }
            Ok(Err(e)) => {
                warn!(
                    target: "cc.actor.bridge",
                    error = ?e,
                    "Bridge manager task panicked during shutdown"
                );
            }
            Err(_) => {
                warn!(
                    target: "cc.actor.bridge",
                    timeout_ms = timeout.as_millis(),
                    "Bridge manager shutdown timed out"
                );
            }
        }
    }
}

/// Create the bridge and start its manager; resolves once the manager is
/// listening.
async fn start_bridge(
    driver: Arc<dyn Driver>,
    seed: ResourceKey,
    settings: BridgeSettings,
    cancel_token: CancellationToken,
) -> Result<ManagedBridge, CcError> {
    let requested = seed.derive(
        ResourceKind::Bridge,
        ResourceKey::generate_id(ResourceKind::Bridge),
    );

    let bridge_key = driver
        .create_bridge(&requested, &settings.bridge_type, &requested.id)
        .await
        .map_err(|e| {
            error!(
                target: "cc.actor.bridge",
                bridge_id = %requested.id,
                error = %e,
                "Failed to create bridge"
            );
            metrics::record_driver_error("create_bridge");
            CcError::BridgeCreation(e)
        })?;

    metrics::record_bridge_created();

    let (state_tx, state_rx) = watch::channel(BridgeState::Listening);
    let (members_tx, _) = watch::channel(BTreeSet::new());
    let members: Members = Arc::new(members_tx);
    let (ready_tx, ready_rx) = oneshot::channel();

    let bridge_type = settings.bridge_type.clone();
    let manager = BridgeManager {
        driver: Arc::clone(&driver),
        key: bridge_key.clone(),
        settings,
        cancel_token,
        state: state_tx,
        members: Arc::clone(&members),
    };
    let task_handle = tokio::spawn(manager.run(ready_tx));

    if ready_rx.await.is_err() {
        error!(
            target: "cc.actor.bridge",
            bridge_id = %bridge_key.id,
            "Bridge manager exited before listening"
        );
        if let Err(e) = driver.delete_bridge(&bridge_key).await {
            warn!(
                target: "cc.actor.bridge",
                bridge_id = %bridge_key.id,
                error = %e,
                "Failed to delete orphaned bridge"
            );
        }
        return Err(CcError::Internal(
            "bridge manager failed to start".to_string(),
        ));
    }

    info!(
        target: "cc.actor.bridge",
        bridge_id = %bridge_key.id,
        bridge_type = %bridge_type,
        "Bridge created and listening"
    );

    Ok(ManagedBridge {
        handle: BridgeHandle::new(bridge_key, state_rx, members),
        task_handle: Some(task_handle),
    })
}

/// Why a bridge manager left its event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    Cancelled,
    Destroyed,
    StreamClosed(EventKind),
}

impl ExitReason {
    const fn as_str(self) -> &'static str {
        match self {
            ExitReason::Cancelled => "cancelled",
            ExitReason::Destroyed => "destroyed",
            ExitReason::StreamClosed(_) => "stream_closed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Announcement {
    Join,
    Leave,
}

impl Announcement {
    const fn as_str(self) -> &'static str {
        match self {
            Announcement::Join => "join",
            Announcement::Leave => "leave",
        }
    }
}

/// Background task owning one bridge's event subscriptions.
struct BridgeManager {
    driver: Arc<dyn Driver>,
    key: ResourceKey,
    settings: BridgeSettings,
    cancel_token: CancellationToken,
    state: watch::Sender<BridgeState>,
    members: Members,
}

impl BridgeManager {
    /// Subscribe, report ready, then react to bridge events until exit.
    #[instrument(skip_all, name = "cc.actor.bridge", fields(bridge_id = %self.key.id))]
    async fn run(self, ready: oneshot::Sender<()>) {
        let mut destroyed = self
            .driver
            .subscribe(Some(&self.key), EventKind::BridgeDestroyed);
        let mut entered = self
            .driver
            .subscribe(Some(&self.key), EventKind::ChannelEnteredBridge);
        let mut left = self
            .driver
            .subscribe(Some(&self.key), EventKind::ChannelLeftBridge);

        // The requester may have gone away; the bridge exists either way.
        let _ = ready.send(());
        metrics::set_bridge_active(true);

        info!(
            target: "cc.actor.bridge",
            bridge_id = %self.key.id,
            "Bridge manager started"
        );

        let reason = loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "cc.actor.bridge",
                        bridge_id = %self.key.id,
                        "Bridge manager received cancellation signal"
                    );
                    break ExitReason::Cancelled;
                }

                event = destroyed.next() => {
                    if let Some(event) = event {
                        debug!(
                            target: "cc.actor.bridge",
                            bridge_id = %self.key.id,
                            bridge_name = %event.name(),
                            "Bridge destroyed"
                        );
                        break ExitReason::Destroyed;
                    }
                    error!(
                        target: "cc.actor.bridge",
                        bridge_id = %self.key.id,
                        "Bridge destroyed subscription closed"
                    );
                    break ExitReason::StreamClosed(EventKind::BridgeDestroyed);
                }

                event = entered.next() => match event {
                    Some(Event::ChannelEnteredBridge(m)) => {
                        debug!(
                            target: "cc.actor.bridge",
                            bridge_id = %self.key.id,
                            channel = %m.channel_name,
                            "Channel entered bridge"
                        );
                        self.announce(Announcement::Join);
                    }
                    Some(other) => self.unexpected(&other),
                    None => {
                        error!(
                            target: "cc.actor.bridge",
                            bridge_id = %self.key.id,
                            "Channel entered subscription closed"
                        );
                        break ExitReason::StreamClosed(EventKind::ChannelEnteredBridge);
                    }
                },

                event = left.next() => match event {
                    Some(Event::ChannelLeftBridge(m)) => {
                        debug!(
                            target: "cc.actor.bridge",
                            bridge_id = %self.key.id,
                            channel = %m.channel_name,
                            "Channel left bridge"
                        );
                        self.members.send_if_modified(|members| members.remove(&m.channel.id));
                        self.announce(Announcement::Leave);
                    }
                    Some(other) => self.unexpected(&other),
                    None => {
                        error!(
                            target: "cc.actor.bridge",
                            bridge_id = %self.key.id,
                            "Channel left subscription closed"
                        );
                        break ExitReason::StreamClosed(EventKind::ChannelLeftBridge);
                    }
                },
            }
        };

        self.state.send_replace(BridgeState::Terminating);
        self.members.send_modify(BTreeSet::clear);

        destroyed.cancel();
        entered.cancel();
        left.cancel();

        self.delete_bridge().await;

        metrics::set_bridge_active(false);
        metrics::record_bridge_teardown(reason.as_str());
        self.state.send_replace(BridgeState::Deleted);

        info!(
            target: "cc.actor.bridge",
            bridge_id = %self.key.id,
            reason = reason.as_str(),
            "Bridge manager stopped"
        );
    }

    /// Issue the delete exactly once; failures are logged, not retried.
    async fn delete_bridge(&self) {
        if let Err(e) = self.driver.delete_bridge(&self.key).await {
            warn!(
                target: "cc.actor.bridge",
                bridge_id = %self.key.id,
                error = %e,
                "Failed to delete bridge"
            );
            metrics::record_driver_error("delete_bridge");
        }
    }

    /// Play an announcement on the bridge.
    ///
    /// The playback runs as a detached, unsupervised task: it is never
    /// joined and its failure is only logged. Announcements do not affect
    /// bridge or call state.
    fn announce(&self, announcement: Announcement) {
        let media_uri = match announcement {
            Announcement::Join => self.settings.join_sound.clone(),
            Announcement::Leave => self.settings.leave_sound.clone(),
        };
        let driver = Arc::clone(&self.driver);
        let bridge = self.key.clone();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            match driver.play(&bridge, &media_uri, &cancel_token).await {
                Ok(()) => metrics::record_announcement(announcement.as_str(), "success"),
                Err(e) => {
                    error!(
                        target: "cc.actor.bridge",
                        bridge_id = %bridge.id,
                        media = %media_uri,
                        error = %e,
                        "Failed to play {} sound",
                        announcement.as_str()
                    );
                    metrics::record_announcement(announcement.as_str(), "error");
                }
            }
        });
    }

    fn unexpected(&self, event: &Event) {
        warn!(
            target: "cc.actor.bridge",
            bridge_id = %self.key.id,
            kind = %event.kind(),
            "Ignoring event delivered on the wrong subscription"
        );
    }
}
