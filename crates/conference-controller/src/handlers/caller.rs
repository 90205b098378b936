//! Caller echo endpoint.
//!
//! `POST /cocapi/` accepts `{"callto": "...", "callfrom": "..."}` and returns
//! the same pair as JSON. Decoding is lenient: a malformed body is logged
//! and whatever string fields could be recovered are echoed, so the client
//! always gets a 200 with a (possibly empty) pair.

use axum::body::Bytes;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Caller pair exchanged by the echo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    #[serde(default)]
    pub callto: String,
    #[serde(default)]
    pub callfrom: String,
}

impl Caller {
    /// Decode a request body, never failing.
    ///
    /// Fields that are missing or not strings come back empty.
    #[must_use]
    pub fn from_lenient(body: &[u8]) -> Self {
        match serde_json::from_slice::<Caller>(body) {
            Ok(caller) => caller,
            Err(e) => {
                debug!(target: "cc.http.echo", error = %e, "Ignoring malformed caller body");
                serde_json::from_slice::<serde_json::Value>(body)
                    .map(|value| Caller {
                        callto: string_field(&value, "callto"),
                        callfrom: string_field(&value, "callfrom"),
                    })
                    .unwrap_or_default()
            }
        }
    }
}

fn string_field(value: &serde_json::Value, name: &str) -> String {
    value
        .get(name)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Handler for `POST /cocapi/`.
#[instrument(skip_all, name = "cc.http.echo")]
pub async fn echo_caller(body: Bytes) -> Json<Caller> {
    let caller = Caller::from_lenient(&body);

    info!(
        target: "cc.http.echo",
        callto = %caller.callto,
        callfrom = %caller.callfrom,
        "Echoing caller"
    );

    Json(caller)
}
