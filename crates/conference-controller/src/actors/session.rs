//! Per-call session handling.
//!
//! Each new call leg gets its own short-lived task that answers the call,
//! optionally dials a configured second party, ensures the shared bridge
//! exists and adds the call leg to it. Answer and dial failures are logged
//! and the flow continues; only a missing bridge stops the session before
//! the add step.

use crate::actors::bridge::BridgeRegistry;
use crate::driver::Driver;
use crate::errors::CcError;
use crate::observability::metrics;

use common::types::ResourceKey;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Second party dialed after answering each call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    /// Calling-party identifier handed to the driver.
    pub destination: String,
    /// How long the far end may ring.
    pub ring_timeout: Duration,
}

/// Per-call behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSettings {
    /// Dial step; skipped when `None`.
    pub dial: Option<DialTarget>,
}

/// Lifecycle phase of a call leg as seen by its session.
///
/// The leg starts `Ringing` and only moves forward. Teardown of the channel
/// belongs to the backend and is not observed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallPhase {
    Ringing,
    Answered,
    Dialing,
    Bridged,
}

impl CallPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CallPhase::Ringing => "ringing",
            CallPhase::Answered => "answered",
            CallPhase::Dialing => "dialing",
            CallPhase::Bridged => "bridged",
        }
    }
}

/// A call leg tracked by its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLeg {
    key: ResourceKey,
    phase: CallPhase,
}

impl CallLeg {
    /// A newly arrived, still ringing leg.
    #[must_use]
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            phase: CallPhase::Ringing,
        }
    }

    #[must_use]
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    #[must_use]
    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    /// Move to `phase`; moves backwards are ignored.
    pub fn advance(&mut self, phase: CallPhase) {
        if phase <= self.phase {
            return;
        }
        debug!(
            target: "cc.actor.session",
            channel_id = %self.key.id,
            from = self.phase.as_str(),
            to = phase.as_str(),
            "Call phase changed"
        );
        self.phase = phase;
    }
}

/// How a call session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The call leg was added to the bridge with this key.
    Bridged(ResourceKey),
    /// The shared bridge could not be obtained; the call was not bridged.
    BridgeUnavailable,
    /// The bridge exists but adding the call leg failed.
    AddChannelFailed(ResourceKey),
    /// Shutdown was requested before the bridge step.
    Cancelled,
}

impl SessionOutcome {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Bridged(_) => "bridged",
            SessionOutcome::BridgeUnavailable => "bridge_unavailable",
            SessionOutcome::AddChannelFailed(_) => "add_channel_failed",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Run the session for one new call leg.
///
/// In-flight driver calls are always allowed to complete; `cancel_token` is
/// only checked before the bridge step.
#[instrument(
    skip_all,
    name = "cc.actor.session",
    fields(channel_id = %channel.id)
)]
pub async fn handle_new_call(
    driver: Arc<dyn Driver>,
    registry: Arc<BridgeRegistry>,
    settings: Arc<CallSettings>,
    channel: ResourceKey,
    cancel_token: CancellationToken,
) -> SessionOutcome {
    let started = Instant::now();
    let mut leg = CallLeg::new(channel);
    let outcome = run_session(&driver, &registry, &settings, &mut leg, &cancel_token).await;

    metrics::record_session_outcome(outcome.as_str());
    metrics::record_session_duration(outcome.as_str(), started.elapsed());
    info!(
        target: "cc.actor.session",
        channel_id = %leg.key().id,
        phase = leg.phase().as_str(),
        outcome = outcome.as_str(),
        "Call session finished"
    );

    outcome
}

async fn run_session(
    driver: &Arc<dyn Driver>,
    registry: &BridgeRegistry,
    settings: &CallSettings,
    leg: &mut CallLeg,
    cancel_token: &CancellationToken,
) -> SessionOutcome {
    let channel = leg.key().clone();

    match driver.answer(&channel).await {
        Ok(()) => leg.advance(CallPhase::Answered),
        Err(e) => {
            warn!(
                target: "cc.actor.session",
                channel_id = %channel.id,
                error = %e,
                "Failed to answer call"
            );
            metrics::record_driver_error("answer");
        }
    }

    if let Some(target) = &settings.dial {
        match driver
            .dial(&channel, &target.destination, target.ring_timeout)
            .await
        {
            Ok(()) => leg.advance(CallPhase::Dialing),
            Err(e) => {
                warn!(
                    target: "cc.actor.session",
                    channel_id = %channel.id,
                    destination = %target.destination,
                    error = %e,
                    "Failed to dial"
                );
                metrics::record_driver_error("dial");
            }
        }
    }

    if cancel_token.is_cancelled() {
        debug!(
            target: "cc.actor.session",
            channel_id = %channel.id,
            "Shutdown requested, not bridging call"
        );
        return SessionOutcome::Cancelled;
    }

    let bridge = match registry.ensure_bridge(driver, &channel, cancel_token).await {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(
                target: "cc.actor.session",
                channel_id = %channel.id,
                error = %e,
                "Failed to ensure bridge"
            );
            metrics::record_error(e.label());
            return SessionOutcome::BridgeUnavailable;
        }
    };

    if let Err(e) = driver.add_channel(bridge.key(), &channel).await {
        let e = CcError::from(e);
        error!(
            target: "cc.actor.session",
            channel_id = %channel.id,
            bridge_id = %bridge.key().id,
            error = %e,
            "Failed to add channel to bridge"
        );
        metrics::record_driver_error("add_channel");
        metrics::record_error(e.label());
        return SessionOutcome::AddChannelFailed(bridge.key().clone());
    }

    bridge.add_member(&channel);
    leg.advance(CallPhase::Bridged);

    debug!(
        target: "cc.actor.session",
        channel_id = %channel.id,
        bridge_id = %bridge.key().id,
        "Channel added to bridge"
    );

    SessionOutcome::Bridged(bridge.key().clone())
}
