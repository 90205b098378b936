//! Embedding entry point for the conference core.
//!
//! A host that owns a concrete [`Driver`] calls [`run_conference`] and
//! cancels the token to stop it.

use crate::actors::bridge::BridgeSettings;
use crate::actors::dispatcher::Dispatcher;
use crate::actors::session::CallSettings;
use crate::driver::Driver;
use crate::errors::CcError;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Run the dispatcher until cancellation, then wait for bridge teardown.
///
/// If the new-call stream closes, the token is cancelled so the bridge
/// manager tears down too, and the error is returned after the bounded
/// wait.
///
/// # Errors
///
/// Returns `CcError::EventStreamClosed` if the driver's event bus closed the
/// new-call subscription.
#[instrument(skip_all)]
pub async fn run_conference(
    driver: Arc<dyn Driver>,
    call_settings: CallSettings,
    bridge_settings: BridgeSettings,
    cancel_token: CancellationToken,
    shutdown_timeout: Duration,
) -> Result<(), CcError> {
    let dispatcher = Dispatcher::new(driver, call_settings, bridge_settings, cancel_token.clone());
    let registry = dispatcher.registry();

    let result = dispatcher.run().await;

    if let Err(e) = &result {
        warn!(
            target: "cc.actor.dispatcher",
            error = %e,
            "Dispatcher failed, cancelling conference"
        );
        cancel_token.cancel();
    }

    registry.shutdown(shutdown_timeout).await;

    info!(target: "cc.actor.dispatcher", "Conference stopped");
    result
}
