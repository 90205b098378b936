//! New-call dispatcher.
//!
//! Subscribes to `StasisStart` for every resource and spawns one session per
//! arriving call leg. Calls whose channel key has no id are logged and
//! dropped. The dispatcher owns the [`BridgeRegistry`] that all its
//! sessions share.
//!
//! # Lifecycle
//!
//! `run()` returns `Ok(())` when the cancellation token fires and
//! `Err(CcError::EventStreamClosed)` when the new-call subscription closes.
//! Sessions already running are not awaited; they observe the same token.

use crate::actors::bridge::{BridgeRegistry, BridgeSettings};
use crate::actors::session::{handle_new_call, CallSettings};
use crate::driver::Driver;
use crate::errors::CcError;
use crate::events::{Event, EventKind};
use crate::observability::metrics;

use common::types::ResourceKey;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Routes new calls to session tasks.
pub struct Dispatcher {
    driver: Arc<dyn Driver>,
    registry: Arc<BridgeRegistry>,
    call_settings: Arc<CallSettings>,
    cancel_token: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher with an empty bridge registry.
    #[must_use]
    pub fn new(
        driver: Arc<dyn Driver>,
        call_settings: CallSettings,
        bridge_settings: BridgeSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            driver,
            registry: Arc::new(BridgeRegistry::new(bridge_settings)),
            call_settings: Arc::new(call_settings),
            cancel_token,
        }
    }

    /// The bridge registry shared by this dispatcher's sessions.
    #[must_use]
    pub fn registry(&self) -> Arc<BridgeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Listen for new calls until cancelled or the event stream closes.
    ///
    /// # Errors
    ///
    /// Returns `CcError::EventStreamClosed` if the new-call subscription
    /// closes while the dispatcher is still running.
    #[instrument(skip_all, name = "cc.actor.dispatcher")]
    pub async fn run(&self) -> Result<(), CcError> {
        let mut calls = self.driver.subscribe(None, EventKind::StasisStart);

        info!(target: "cc.actor.dispatcher", "Dispatcher listening for new calls");

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "cc.actor.dispatcher",
                        "Dispatcher received cancellation signal, exiting"
                    );
                    return Ok(());
                }

                event = calls.next() => match event {
                    Some(Event::StasisStart(call)) => {
                        if let Err(e) = call.channel.validate() {
                            let e = CcError::InvalidEvent(e.to_string());
                            warn!(
                                target: "cc.actor.dispatcher",
                                channel = %call.name,
                                error = %e,
                                "Dropping new call without a usable channel key"
                            );
                            metrics::record_error(e.label());
                            continue;
                        }
                        info!(
                            target: "cc.actor.dispatcher",
                            channel_id = %call.channel.id,
                            channel = %call.name,
                            "New call"
                        );
                        metrics::record_call_received();
                        self.spawn_session(call.channel);
                    }
                    Some(other) => {
                        debug!(
                            target: "cc.actor.dispatcher",
                            kind = %other.kind(),
                            "Ignoring non-call event"
                        );
                    }
                    None => {
                        error!(
                            target: "cc.actor.dispatcher",
                            "New-call subscription closed"
                        );
                        let e = CcError::EventStreamClosed(EventKind::StasisStart.to_string());
                        metrics::record_error(e.label());
                        return Err(e);
                    }
                },
            }
        }
    }

    fn spawn_session(&self, channel: ResourceKey) {
        tokio::spawn(handle_new_call(
            Arc::clone(&self.driver),
            Arc::clone(&self.registry),
            Arc::clone(&self.call_settings),
            channel,
            self.cancel_token.clone(),
        ));
    }
}
