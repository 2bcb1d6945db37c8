//! Wire protocol: line-delimited JSON objects tagged by `type`.
//!
//! Frames are decoded once at the transport boundary; the relay never
//! looks inside a `data` payload. `Data` keeps its free-form fields in a
//! flattened map so a decoded frame re-encodes with the payload intact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire string sent to a browser when the target device is not registered.
pub const ERR_DEVICE_OFFLINE: &str = "Device off-line";

/// Wire string sent to a device whose id is already registered.
pub const ERR_ID_CONFLICT: &str = "ID conflicts";

/// Protocol messages exchanged over both connection kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Device heartbeat.
    Ping,

    /// Heartbeat reply to the device.
    Pong,

    /// Session establishment. Three shapes share the tag: `{sid}` to the
    /// browser, `{did, sid}` to the device, `{err}` on failure.
    Login {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        did: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        err: Option<String>,
    },

    /// Session teardown, relayed between the peers of `sid`.
    Logout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        did: Option<String>,
        sid: String,
    },

    /// Opaque terminal traffic for session `sid`. Browser-originated
    /// frames carry `did` so the router can find the device.
    Data {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        did: Option<String>,
        sid: String,
        #[serde(flatten)]
        payload: serde_json::Map<String, Value>,
    },

    /// Registration outcome; only ever sent with `err` on an id conflict.
    Add { err: String },
}
