//! Channel origination descriptor.
//!
//! `OriginateRequest` is forwarded verbatim to the telephony driver. The
//! conference core never mutates it; drivers call [`OriginateRequest::validate`]
//! at their boundary before placing the call.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for creating a new outbound channel.
///
/// Exactly one destination must be set: either the dialplan target
/// (`context` + `extension` + `priority` or `label`) or the application
/// target (`app`, optionally with `app_args`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginateRequest {
    /// Resource used to create the channel, `tech/resource` (e.g. `PJSIP/george`).
    pub endpoint: String,

    /// Seconds to wait for answer. Negative means no timeout.
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub timeout: i32,

    /// Caller ID in `"Name" <number>` form.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caller_id: String,

    /// Dialplan context.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,

    /// Dialplan extension.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extension: String,

    /// Dialplan priority.
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub priority: i64,

    /// Dialplan label; takes precedence over `priority` when both are set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    /// Application the new channel is placed into.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app: String,

    /// Arguments for `app`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_args: String,

    /// Comma-separated codec list (e.g. `ulaw,slin16`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub formats: String,

    /// Identifier to assign to the new channel.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel_id: String,

    /// Identifier of the second channel of a Local channel pair.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub other_channel_id: String,

    /// Channel on whose behalf the origination is made (codec hinting).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub originator: String,

    /// Channel variables set on the new channel.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if signature
fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

impl OriginateRequest {
    /// Build a request that drops the channel into the dialplan.
    #[must_use]
    pub fn to_dialplan(
        endpoint: impl Into<String>,
        context: impl Into<String>,
        extension: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            context: context.into(),
            extension: extension.into(),
            priority,
            ..Self::default()
        }
    }

    /// Build a request that places the channel into an application.
    #[must_use]
    pub fn to_application(endpoint: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            app: app.into(),
            ..Self::default()
        }
    }

    fn has_dialplan_target(&self) -> bool {
        !self.context.is_empty()
            || !self.extension.is_empty()
            || self.priority != 0
            || !self.label.is_empty()
    }

    /// Validate the request before handing it to the telephony backend.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::InvalidOrigination` when the endpoint is empty,
    /// when both or neither destination is set, when the dialplan target is
    /// incomplete, or when `app_args` is given without `app`.
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.endpoint.trim().is_empty() {
            return Err(CommonError::InvalidOrigination(
                "endpoint is required".to_string(),
            ));
        }

        if !self.app_args.is_empty() && self.app.is_empty() {
            return Err(CommonError::InvalidOrigination(
                "appArgs requires app".to_string(),
            ));
        }

        let dialplan = self.has_dialplan_target();
        let application = !self.app.is_empty();

        match (dialplan, application) {
            (true, true) => Err(CommonError::InvalidOrigination(
                "dialplan target and app are mutually exclusive".to_string(),
            )),
            (false, false) => Err(CommonError::InvalidOrigination(
                "one of dialplan target or app is required".to_string(),
            )),
            (false, true) => Ok(()),
            (true, false) => {
                if self.context.is_empty() || self.extension.is_empty() {
                    return Err(CommonError::InvalidOrigination(
                        "dialplan target requires context and extension".to_string(),
                    ));
                }
                if self.priority <= 0 && self.label.is_empty() {
                    return Err(CommonError::InvalidOrigination(
                        "dialplan target requires priority or label".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
