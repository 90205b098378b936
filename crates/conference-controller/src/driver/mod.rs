//! Telephony driver capability.
//!
//! The conference core never speaks the backend protocol itself. Everything
//! it needs from the telephony server (call control, bridge control,
//! playback and the event bus) goes through the [`Driver`] trait, which a
//! concrete client implements and tests replace with a mock.
//!
//! Driver calls may block the calling task until the backend answers; the
//! core never interrupts an in-flight call.

pub mod subscription;

pub use subscription::Subscription;

use crate::events::EventKind;
use common::error::CommonError;
use common::origination::OriginateRequest;
use common::types::ResourceKey;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error returned by driver calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The backend refused the request.
    #[error("Driver rejected request: {0}")]
    Rejected(String),

    /// The addressed resource does not exist (anymore).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or timed out.
    #[error("Driver unavailable: {0}")]
    Unavailable(String),

    /// The request failed boundary validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<CommonError> for DriverError {
    fn from(err: CommonError) -> Self {
        DriverError::InvalidRequest(err.to_string())
    }
}

/// Operations the conference core consumes from the telephony backend.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Answer a ringing call leg.
    async fn answer(&self, channel: &ResourceKey) -> Result<(), DriverError>;

    /// Dial a call leg that was created but not yet dialed.
    ///
    /// `caller` identifies the calling party; `ring_timeout` bounds how long
    /// the far end may ring.
    async fn dial(
        &self,
        channel: &ResourceKey,
        caller: &str,
        ring_timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Create a bridge with the given key, type (e.g. `mixing`) and name.
    ///
    /// Returns the key of the bridge as known to the backend.
    async fn create_bridge(
        &self,
        bridge: &ResourceKey,
        bridge_type: &str,
        name: &str,
    ) -> Result<ResourceKey, DriverError>;

    /// Add a call leg's channel to a bridge.
    async fn add_channel(
        &self,
        bridge: &ResourceKey,
        channel: &ResourceKey,
    ) -> Result<(), DriverError>;

    /// Destroy a bridge.
    async fn delete_bridge(&self, bridge: &ResourceKey) -> Result<(), DriverError>;

    /// Play media (e.g. `sound:confbridge-join`) on a bridge.
    ///
    /// Implementations that wait for playback to finish should stop waiting
    /// when `cancel_token` fires.
    async fn play(
        &self,
        bridge: &ResourceKey,
        media_uri: &str,
        cancel_token: &CancellationToken,
    ) -> Result<(), DriverError>;

    /// Create a new outbound channel.
    ///
    /// Implementations call [`OriginateRequest::validate`] before contacting
    /// the backend.
    async fn originate(
        &self,
        scope: &ResourceKey,
        request: &OriginateRequest,
    ) -> Result<ResourceKey, DriverError>;

    /// Register for events of `kind`, optionally scoped to one resource.
    ///
    /// `None` receives the event for every resource and application.
    fn subscribe(&self, key: Option<&ResourceKey>, kind: EventKind) -> Subscription;
}
