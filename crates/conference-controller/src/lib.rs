//! Conference Controller Library
//!
//! Places every inbound call leg into one shared mixing bridge and announces
//! joins and leaves on it.
//!
//! # Architecture
//!
//! - [`actors::Dispatcher`] subscribes to new calls and spawns a session per
//!   call leg
//! - [`actors::session`] answers, optionally dials, then adds the call leg to
//!   the shared bridge
//! - [`actors::BridgeRegistry`] creates the bridge exactly once and starts
//!   its manager before anyone sees it
//! - [`driver::Driver`] is the telephony backend capability (call control,
//!   bridge control, playback, event bus)
//!
//! # Modules
//!
//! - [`actors`] - Dispatcher, call sessions and the bridge lifecycle
//! - [`config`] - Environment configuration
//! - [`driver`] - Driver trait and event subscriptions
//! - [`errors`] - Error types
//! - [`events`] - Typed telephony events
//! - [`handlers`] / [`routes`] - HTTP API
//! - [`observability`] - Metrics and health probes
//! - [`service`] - Embedding entry point

#![warn(clippy::pedantic)]

pub mod actors;
pub mod config;
pub mod driver;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod service;
