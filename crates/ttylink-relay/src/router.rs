//! Relay router: classifies decoded frames by origin and type and
//! forwards them verbatim to the destination peer.

use ttylink_common::{Message, SessionId};

use crate::registry::DeviceRegistry;

/// Dispatch a frame read from a device connection.
///
/// `ping` is a proof-of-life and gets a `pong` reply; `data` and `logout`
/// are relayed to the browser bound under their `sid`. A frame for an
/// unknown session is dropped; the wire protocol has no error shape to
/// report it with, so it is only logged.
pub async fn from_device(registry: &DeviceRegistry, did: &str, msg: Message) {
    match msg {
        Message::Ping => {
            registry.touch(did).await;
            if let Some(device) = registry.connection(did).await {
                device.send(Message::Pong);
            }
        }
        Message::Data { ref sid, .. } | Message::Logout { ref sid, .. } => {
            let sid = SessionId::from(sid.as_str());
            match registry.session(did, &sid).await {
                Some(browser) => browser.send(msg),
                None => {
                    tracing::debug!(device = %did, session = %sid, "unknown session, dropping frame");
                }
            }
        }
        _ => {}
    }
}

/// Dispatch a frame read from a browser connection.
///
/// Only `data` is relayed, using the `(did, sid)` pair embedded in the
/// frame; everything else a browser sends is ignored.
pub async fn from_browser(registry: &DeviceRegistry, msg: Message) {
    if let Message::Data { did: Some(ref did), .. } = msg {
        let did = did.clone();
        match registry.connection(&did).await {
            Some(device) => device.send(msg),
            None => {
                tracing::debug!(device = %did, "device off-line, dropping frame");
            }
        }
    }
}
