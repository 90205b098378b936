//! Conference Controller error types.
//!
//! Driver-call failures are logged where they happen and only surface as
//! `CcError` when they end a step: bridge creation, adding a channel, or a
//! dispatcher-level fault. Every surfaced error is counted under its
//! [`CcError::label`] in `cc_errors_total`.

use crate::driver::DriverError;
use thiserror::Error;

/// Conference Controller error type.
#[derive(Debug, Error)]
pub enum CcError {
    /// The telephony driver rejected or failed a request.
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Creating the shared bridge failed; a later caller may retry.
    #[error("Bridge creation failed: {0}")]
    BridgeCreation(DriverError),

    /// The shared bridge was torn down and is not re-created for this process.
    #[error("Bridge {0} has been terminated")]
    BridgeTerminated(String),

    /// An event carried a resource key that cannot be acted on.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// An event subscription closed underneath its consumer.
    #[error("Event stream closed: {0}")]
    EventStreamClosed(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CcError {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            CcError::Driver(_) => "driver",
            CcError::BridgeCreation(_) => "bridge_creation",
            CcError::BridgeTerminated(_) => "bridge_terminated",
            CcError::InvalidEvent(_) => "invalid_event",
            CcError::EventStreamClosed(_) => "event_stream_closed",
            CcError::Internal(_) => "internal",
        }
    }
}
