//! Event-bus subscription handle.
//!
//! A `Subscription` is one registration against the event bus for one event
//! kind (optionally scoped to one resource). The bus keeps the sending half
//! and the subscription's token; the subscriber pulls events with
//! [`Subscription::next`]. Cancelling is idempotent, and dropping a
//! subscription cancels it, so a registration never outlives its owner.

use crate::events::{Event, EventKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Receiving half of an event-bus registration.
#[derive(Debug)]
pub struct Subscription {
    kind: EventKind,
    events: mpsc::UnboundedReceiver<Event>,
    cancel_token: CancellationToken,
}

impl Subscription {
    /// Create a subscription from the receiver the bus delivers into.
    ///
    /// The bus should keep a clone of `cancel_token` and stop delivering once
    /// it is cancelled.
    #[must_use]
    pub fn new(
        kind: EventKind,
        events: mpsc::UnboundedReceiver<Event>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            kind,
            events,
            cancel_token,
        }
    }

    /// Event kind this subscription was registered for.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription is cancelled or the bus has
    /// closed its side. Events already queued are still returned in order
    /// after the bus closes, but never after cancellation.
    pub async fn next(&mut self) -> Option<Event> {
        tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Release the registration. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the registration has been released.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
