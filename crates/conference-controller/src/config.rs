//! Conference Controller configuration.
//!
//! Configuration is loaded from `CC_`-prefixed environment variables. Every
//! variable has a default; malformed values are rejected rather than
//! silently replaced.
//!
//! The `conference-controller` binary only serves HTTP and uses the bind
//! address and shutdown timeout. The dial, bridge and sound variables
//! configure the conference core, which needs a telephony driver: a host
//! that embeds the core passes [`Config::call_settings`] and
//! [`Config::bridge_settings`] to `service::run_conference`.

use crate::actors::bridge::{
    BridgeSettings, DEFAULT_BRIDGE_TYPE, DEFAULT_JOIN_SOUND, DEFAULT_LEAVE_SOUND,
};
use crate::actors::session::{CallSettings, DialTarget};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP API bind address.
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default ring timeout for the dial step in seconds.
pub const DEFAULT_DIAL_RING_TIMEOUT_SECONDS: u64 = 30;

/// Default bound on waiting for bridge teardown at shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;

/// Conference Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP API bind address (default: "0.0.0.0:8000").
    pub http_bind_address: String,

    /// Calling-party identifier dialed after answering; dial skipped if unset.
    pub dial_destination: Option<String>,

    /// Ring timeout for the dial step (default: 30).
    pub dial_ring_timeout_seconds: u64,

    /// Bridge type requested on creation (default: "mixing").
    pub bridge_type: String,

    /// Media URI played when a channel enters the bridge.
    pub join_sound: String,

    /// Media URI played when a channel leaves the bridge.
    pub leave_sound: String,

    /// Bound on waiting for the bridge manager at shutdown (default: 5).
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set but malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let http_bind_address = vars
            .get("CC_HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        // An empty destination means "no dial step", same as unset
        let dial_destination = vars
            .get("CC_DIAL_DESTINATION")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let dial_ring_timeout_seconds = parse_u64(
            vars,
            "CC_DIAL_RING_TIMEOUT_SECONDS",
            DEFAULT_DIAL_RING_TIMEOUT_SECONDS,
        )?;

        let bridge_type = non_empty(vars, "CC_BRIDGE_TYPE", DEFAULT_BRIDGE_TYPE)?;
        let join_sound = non_empty(vars, "CC_JOIN_SOUND", DEFAULT_JOIN_SOUND)?;
        let leave_sound = non_empty(vars, "CC_LEAVE_SOUND", DEFAULT_LEAVE_SOUND)?;

        let shutdown_timeout_seconds = parse_u64(
            vars,
            "CC_SHUTDOWN_TIMEOUT_SECONDS",
            DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            http_bind_address,
            dial_destination,
            dial_ring_timeout_seconds,
            bridge_type,
            join_sound,
            leave_sound,
            shutdown_timeout_seconds,
        })
    }

    /// Per-call behavior derived from this configuration.
    #[must_use]
    pub fn call_settings(&self) -> CallSettings {
        CallSettings {
            dial: self.dial_destination.as_ref().map(|destination| DialTarget {
                destination: destination.clone(),
                ring_timeout: Duration::from_secs(self.dial_ring_timeout_seconds),
            }),
        }
    }

    /// Bridge creation and announcement settings.
    #[must_use]
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            bridge_type: self.bridge_type.clone(),
            join_sound: self.join_sound.clone(),
            leave_sound: self.leave_sound.clone(),
        }
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

fn parse_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "{name} must be a whole number of seconds, got {raw:?}"
            ))
        }),
    }
}

fn non_empty(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match vars.get(name) {
        None => Ok(default.to_string()),
        Some(raw) if raw.trim().is_empty() => {
            Err(ConfigError::InvalidValue(format!("{name} must not be empty")))
        }
        Some(raw) => Ok(raw.trim().to_string()),
    }
}
