//! Keys, events and raw ARI bodies for tests.

use common::types::ResourceKey;
use conference_controller::events::{BridgeDestroyed, BridgeMembership, CallStarted, Event};

/// Channel key with no node scope.
pub fn channel(id: &str) -> ResourceKey {
    ResourceKey::channel(id)
}

/// Conventional channel name for a test channel id.
pub fn channel_name(id: &str) -> String {
    format!("PJSIP/{id}-00000001")
}

/// A new call leg entering the application.
pub fn call_started(id: &str) -> Event {
    Event::StasisStart(CallStarted {
        channel: channel(id),
        name: channel_name(id),
    })
}

pub fn channel_entered(bridge: &ResourceKey, channel_id: &str) -> Event {
    Event::ChannelEnteredBridge(membership(bridge, channel_id))
}

pub fn channel_left(bridge: &ResourceKey, channel_id: &str) -> Event {
    Event::ChannelLeftBridge(membership(bridge, channel_id))
}

pub fn bridge_destroyed(bridge: &ResourceKey) -> Event {
    Event::BridgeDestroyed(BridgeDestroyed {
        bridge: bridge.clone(),
        name: bridge.id.clone(),
    })
}

fn membership(bridge: &ResourceKey, channel_id: &str) -> BridgeMembership {
    BridgeMembership {
        bridge: bridge.clone(),
        channel: bridge.derive(common::types::ResourceKind::Channel, channel_id),
        channel_name: channel_name(channel_id),
    }
}

/// Raw ARI `StasisStart` body as delivered on the event websocket.
pub fn ari_stasis_start(channel_id: &str, node: &str, app: &str) -> Vec<u8> {
    serde_json::json!({
        "type": "StasisStart",
        "application": app,
        "asterisk_id": node,
        "timestamp": "2019-04-04T05:16:21.000+0000",
        "args": [],
        "channel": {
            "id": channel_id,
            "name": channel_name(channel_id),
            "state": "Ring",
        },
    })
    .to_string()
    .into_bytes()
}
