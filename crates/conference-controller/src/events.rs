//! Typed telephony events consumed by the conference core.
//!
//! The event bus delivers a closed set of event kinds. Drivers decode the
//! raw backend payload once, at their boundary, with [`Event::from_ari_json`];
//! everything past that point matches on the [`Event`] variants.

use common::types::{ResourceKey, ResourceKind};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Kinds of events the conference core subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new call leg entered application control.
    StasisStart,
    /// A bridge was destroyed by the backend.
    BridgeDestroyed,
    /// A channel joined a bridge.
    ChannelEnteredBridge,
    /// A channel left a bridge.
    ChannelLeftBridge,
}

impl EventKind {
    /// Wire name of the event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::StasisStart => "StasisStart",
            EventKind::BridgeDestroyed => "BridgeDestroyed",
            EventKind::ChannelEnteredBridge => "ChannelEnteredBridge",
            EventKind::ChannelLeftBridge => "ChannelLeftBridge",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call leg entered application control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStarted {
    /// Key of the new channel.
    pub channel: ResourceKey,
    /// Channel name (e.g. `PJSIP/6001-00000001`).
    pub name: String,
}

/// A bridge-level event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDestroyed {
    /// Key of the bridge.
    pub bridge: ResourceKey,
    /// Bridge name.
    pub name: String,
}

/// A channel entered or left a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMembership {
    /// Key of the bridge.
    pub bridge: ResourceKey,
    /// Key of the channel that moved.
    pub channel: ResourceKey,
    /// Name of the channel that moved.
    pub channel_name: String,
}

/// Event delivered by the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StasisStart(CallStarted),
    BridgeDestroyed(BridgeDestroyed),
    ChannelEnteredBridge(BridgeMembership),
    ChannelLeftBridge(BridgeMembership),
}

impl Event {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::StasisStart(_) => EventKind::StasisStart,
            Event::BridgeDestroyed(_) => EventKind::BridgeDestroyed,
            Event::ChannelEnteredBridge(_) => EventKind::ChannelEnteredBridge,
            Event::ChannelLeftBridge(_) => EventKind::ChannelLeftBridge,
        }
    }

    /// The key subscriptions filter on.
    ///
    /// The channel for `StasisStart`, the bridge for every bridge event.
    #[must_use]
    pub fn subject(&self) -> &ResourceKey {
        match self {
            Event::StasisStart(e) => &e.channel,
            Event::BridgeDestroyed(e) => &e.bridge,
            Event::ChannelEnteredBridge(e) | Event::ChannelLeftBridge(e) => &e.bridge,
        }
    }

    /// Human-readable name of the acting resource.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Event::StasisStart(e) => &e.name,
            Event::BridgeDestroyed(e) => &e.name,
            Event::ChannelEnteredBridge(e) | Event::ChannelLeftBridge(e) => &e.channel_name,
        }
    }

    /// Whether this event should be delivered to a subscription with `filter`.
    ///
    /// `None` subscribes to every resource.
    #[must_use]
    pub fn matches(&self, filter: Option<&ResourceKey>) -> bool {
        filter.map_or(true, |key| self.subject().same_resource(key))
    }

    /// Decode a raw ARI event body.
    ///
    /// Node and application are taken from the envelope (`asterisk_id`,
    /// `application`) and stamped into every key. Event types outside the
    /// consumed set decode to `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `EventDecodeError` when the body is not a valid event envelope.
    pub fn from_ari_json(body: &[u8]) -> Result<Option<Event>, EventDecodeError> {
        let raw: RawEnvelope = serde_json::from_slice(body)
            .map_err(|e| EventDecodeError::Malformed(e.to_string()))?;

        let scope = |kind: ResourceKind, id: String| {
            let mut key = ResourceKey::new(kind, id).with_node(raw.asterisk_id.clone());
            if let Some(app) = &raw.application {
                key = key.with_app(app.clone());
            }
            key
        };

        let event = match raw.event {
            RawEvent::StasisStart { channel } => Event::StasisStart(CallStarted {
                channel: scope(ResourceKind::Channel, channel.id),
                name: channel.name,
            }),
            RawEvent::BridgeDestroyed { bridge } => Event::BridgeDestroyed(BridgeDestroyed {
                bridge: scope(ResourceKind::Bridge, bridge.id),
                name: bridge.name,
            }),
            RawEvent::ChannelEnteredBridge { bridge, channel } => {
                Event::ChannelEnteredBridge(BridgeMembership {
                    bridge: scope(ResourceKind::Bridge, bridge.id),
                    channel: scope(ResourceKind::Channel, channel.id),
                    channel_name: channel.name,
                })
            }
            RawEvent::ChannelLeftBridge { bridge, channel } => {
                Event::ChannelLeftBridge(BridgeMembership {
                    bridge: scope(ResourceKind::Bridge, bridge.id),
                    channel: scope(ResourceKind::Channel, channel.id),
                    channel_name: channel.name,
                })
            }
            RawEvent::Other => return Ok(None),
        };

        if event.subject().id.is_empty() {
            return Err(EventDecodeError::MissingId(event.kind()));
        }

        Ok(Some(event))
    }
}

/// Errors decoding a raw event body.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The body is not JSON or lacks required fields.
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// The acting resource has no identifier.
    #[error("{0} event without resource id")]
    MissingId(EventKind),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    application: Option<String>,
    #[serde(default)]
    asterisk_id: String,
    #[serde(flatten)]
    event: RawEvent,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawEvent {
    StasisStart {
        channel: RawResource,
    },
    BridgeDestroyed {
        bridge: RawResource,
    },
    ChannelEnteredBridge {
        bridge: RawResource,
        channel: RawResource,
    },
    ChannelLeftBridge {
        bridge: RawResource,
        channel: RawResource,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawResource {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stasis_start() {
        let body = br#"{
            "type": "StasisStart",
            "application": "hello-world",
            "asterisk_id": "ast-01",
            "args": [],
            "channel": {"id": "1554355381.25969", "name": "PJSIP/6001-00000001", "state": "Ring"}
        }"#;

        let event = Event::from_ari_json(body).unwrap().unwrap();
        assert_eq!(event.kind(), EventKind::StasisStart);
        assert_eq!(event.name(), "PJSIP/6001-00000001");

        let key = event.subject();
        assert_eq!(key.kind, ResourceKind::Channel);
        assert_eq!(key.id, "1554355381.25969");
        assert_eq!(key.node, "ast-01");
        assert_eq!(key.app.as_deref(), Some("hello-world"));
    }

    #[test]
    fn test_decode_membership_events() {
        let entered = br#"{
            "type": "ChannelEnteredBridge",
            "application": "hello-world",
            "asterisk_id": "ast-01",
            "bridge": {"id": "br-1", "name": "br-1", "bridge_type": "mixing"},
            "channel": {"id": "C1", "name": "PJSIP/6001-00000001"}
        }"#;

        match Event::from_ari_json(entered).unwrap().unwrap() {
            Event::ChannelEnteredBridge(m) => {
                assert_eq!(m.bridge.id, "br-1");
                assert_eq!(m.bridge.kind, ResourceKind::Bridge);
                assert_eq!(m.channel.id, "C1");
                assert_eq!(m.channel.kind, ResourceKind::Channel);
                assert_eq!(m.channel_name, "PJSIP/6001-00000001");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let left = br#"{
            "type": "ChannelLeftBridge",
            "bridge": {"id": "br-1"},
            "channel": {"id": "C1", "name": "PJSIP/6001-00000001"}
        }"#;
        let event = Event::from_ari_json(left).unwrap().unwrap();
        assert_eq!(event.kind(), EventKind::ChannelLeftBridge);
        assert_eq!(event.subject().id, "br-1");
        assert!(event.subject().app.is_none());
    }

    #[test]
    fn test_decode_bridge_destroyed() {
        let body = br#"{"type": "BridgeDestroyed", "bridge": {"id": "br-9", "name": "conf"}}"#;
        let event = Event::from_ari_json(body).unwrap().unwrap();
        assert_eq!(
            event,
            Event::BridgeDestroyed(BridgeDestroyed {
                bridge: ResourceKey::bridge("br-9"),
                name: "conf".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_event_type_is_skipped() {
        let body = br#"{"type": "ChannelDtmfReceived", "digit": "5", "channel": {"id": "C1"}}"#;
        assert!(Event::from_ari_json(body).unwrap().is_none());
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            Event::from_ari_json(b"not json"),
            Err(EventDecodeError::Malformed(_))
        ));
        // Known type with the resource object missing
        assert!(matches!(
            Event::from_ari_json(br#"{"type": "StasisStart"}"#),
            Err(EventDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_id() {
        let body = br#"{"type": "BridgeDestroyed", "bridge": {"name": "conf"}}"#;
        assert!(matches!(
            Event::from_ari_json(body),
            Err(EventDecodeError::MissingId(EventKind::BridgeDestroyed))
        ));
    }

    #[test]
    fn test_matches_filter() {
        let event = Event::ChannelEnteredBridge(BridgeMembership {
            bridge: ResourceKey::bridge("B1"),
            channel: ResourceKey::channel("C1"),
            channel_name: "PJSIP/1".to_string(),
        });

        assert!(event.matches(None));
        assert!(event.matches(Some(&ResourceKey::bridge("B1"))));
        assert!(!event.matches(Some(&ResourceKey::bridge("B2"))));
        // Membership events are filtered on the bridge, not the channel
        assert!(!event.matches(Some(&ResourceKey::channel("C1"))));
    }
}
