//! Resource keys for addressable telephony resources.
//!
//! A [`ResourceKey`] identifies a call leg (channel) or a bridge on a given
//! telephony node. Keys are immutable values; a new key for a related
//! resource is derived with [`ResourceKey::derive`], which keeps the node,
//! dialog and application scope of the source key.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of telephony resource a key points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A live call leg.
    Channel,
    /// A mixing bridge.
    Bridge,
}

impl ResourceKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Channel => "channel",
            ResourceKind::Bridge => "bridge",
        }
    }

    /// Prefix used for identifiers generated for this kind.
    #[must_use]
    pub const fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Channel => "ch",
            ResourceKind::Bridge => "br",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" => Ok(ResourceKind::Channel),
            "bridge" => Ok(ResourceKind::Bridge),
            other => Err(CommonError::UnknownResourceKind(other.to_string())),
        }
    }
}

/// Identifies a telephony resource.
///
/// The identifier is unique within `(kind, node)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Kind of resource.
    pub kind: ResourceKind,
    /// Unique identifier of the resource.
    pub id: String,
    /// Node (telephony server) that owns the resource.
    #[serde(default)]
    pub node: String,
    /// Named scope used to route events to an owning component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog: Option<String>,
    /// Application the resource is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl ResourceKey {
    /// Create a key with no node, dialog or application scope.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            node: String::new(),
            dialog: None,
            app: None,
        }
    }

    /// Create a channel key.
    #[must_use]
    pub fn channel(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Channel, id)
    }

    /// Create a bridge key.
    #[must_use]
    pub fn bridge(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Bridge, id)
    }

    /// Set the owning node.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    /// Set the dialog scope.
    #[must_use]
    pub fn with_dialog(mut self, dialog: impl Into<String>) -> Self {
        self.dialog = Some(dialog.into());
        self
    }

    /// Set the owning application.
    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Derive a key for another resource in the same scope.
    ///
    /// The new key inherits node, dialog and application from `self`.
    #[must_use]
    pub fn derive(&self, kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            node: self.node.clone(),
            dialog: self.dialog.clone(),
            app: self.app.clone(),
        }
    }

    /// Whether both keys address the same resource.
    ///
    /// Dialog and application are routing scope only and are ignored. An empty
    /// node on either side matches any node.
    #[must_use]
    pub fn same_resource(&self, other: &ResourceKey) -> bool {
        self.kind == other.kind
            && self.id == other.id
            && (self.node.is_empty() || other.node.is_empty() || self.node == other.node)
    }

    /// Generate a fresh identifier for a resource of `kind`.
    #[must_use]
    pub fn generate_id(kind: ResourceKind) -> String {
        format!("{}-{}", kind.id_prefix(), Uuid::new_v4().simple())
    }

    /// Check that the key has a non-empty identifier.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::InvalidKey` when the identifier is empty.
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.id.trim().is_empty() {
            return Err(CommonError::InvalidKey(format!(
                "{} key has an empty id",
                self.kind
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.node.is_empty() {
            write!(f, "{}:{}", self.kind, self.id)
        } else {
            write!(f, "{}:{}@{}", self.kind, self.id, self.node)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_inherits_scope() {
        let channel = ResourceKey::channel("C1")
            .with_node("ast-01")
            .with_dialog("dlg-7")
            .with_app("hello-world");

        let bridge = channel.derive(ResourceKind::Bridge, "B1");

        assert_eq!(bridge.kind, ResourceKind::Bridge);
        assert_eq!(bridge.id, "B1");
        assert_eq!(bridge.node, "ast-01");
        assert_eq!(bridge.dialog.as_deref(), Some("dlg-7"));
        assert_eq!(bridge.app.as_deref(), Some("hello-world"));

        // Source key is untouched
        assert_eq!(channel.kind, ResourceKind::Channel);
        assert_eq!(channel.id, "C1");
    }

    #[test]
    fn test_generate_id_is_prefixed_and_unique() {
        let a = ResourceKey::generate_id(ResourceKind::Bridge);
        let b = ResourceKey::generate_id(ResourceKind::Bridge);

        assert!(a.starts_with("br-"));
        assert!(ResourceKey::generate_id(ResourceKind::Channel).starts_with("ch-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_resource() {
        let a = ResourceKey::bridge("B1").with_node("ast-01");
        let b = ResourceKey::bridge("B1").with_node("ast-01").with_app("x");
        let c = ResourceKey::bridge("B1").with_node("ast-02");
        let unscoped = ResourceKey::bridge("B1");
        let channel = ResourceKey::channel("B1");

        assert!(a.same_resource(&b));
        assert!(!a.same_resource(&c));
        assert!(a.same_resource(&unscoped));
        assert!(!a.same_resource(&channel));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("channel".parse::<ResourceKind>().unwrap(), ResourceKind::Channel);
        assert_eq!("bridge".parse::<ResourceKind>().unwrap(), ResourceKind::Bridge);
        assert!(matches!(
            "playback".parse::<ResourceKind>(),
            Err(CommonError::UnknownResourceKind(k)) if k == "playback"
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceKey::channel("C1").to_string(), "channel:C1");
        assert_eq!(
            ResourceKey::bridge("B1").with_node("ast-01").to_string(),
            "bridge:B1@ast-01"
        );
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        assert!(ResourceKey::channel("C1").validate().is_ok());
        assert!(matches!(
            ResourceKey::channel("  ").validate(),
            Err(CommonError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_serde_field_names() {
        let key = ResourceKey::channel("C1").with_node("ast-01").with_app("app");
        let json = serde_json::to_value(&key).unwrap();

        assert_eq!(json["kind"], "channel");
        assert_eq!(json["id"], "C1");
        assert_eq!(json["node"], "ast-01");
        assert_eq!(json["app"], "app");
        assert!(json.get("dialog").is_none());

        let back: ResourceKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }
}
