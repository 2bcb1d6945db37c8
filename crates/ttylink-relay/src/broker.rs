//! Session broker: mints session ids and binds browser connections to a
//! device + session pair.

use ttylink_common::{Message, RelayError, Result, SessionId};

use crate::registry::{Bind, ConnectionHandle, DeviceRegistry};

#[derive(Clone)]
pub struct SessionBroker {
    registry: DeviceRegistry,
}

impl SessionBroker {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    /// Bind `browser` to a fresh session on `did`.
    ///
    /// Mints a session id, retrying until it is unique within the
    /// device's session set, then notifies the browser (`login {sid}`)
    /// and the device (`login {did, sid}`) so it can open a matching pty.
    pub async fn login(&self, did: &str, browser: ConnectionHandle) -> Result<SessionId> {
        loop {
            let sid = SessionId::mint(did);
            match self
                .registry
                .bind_session(did, sid.clone(), browser.clone())
                .await
            {
                Bind::Bound => {
                    browser.send(Message::Login {
                        did: None,
                        sid: Some(sid.to_string()),
                        err: None,
                    });
                    if let Some(device) = self.registry.connection(did).await {
                        device.send(Message::Login {
                            did: Some(did.to_string()),
                            sid: Some(sid.to_string()),
                            err: None,
                        });
                    }
                    tracing::info!(device = %did, session = %sid, "browser logged in");
                    return Ok(sid);
                }
                Bind::Collision => continue,
                Bind::DeviceGone => return Err(RelayError::DeviceOffline(did.to_string())),
            }
        }
    }

    /// Drop the binding for `(did, sid)` and notify the device.
    ///
    /// An unknown device is an error; an unknown sid on a known device is
    /// a silent no-op and sends nothing.
    pub async fn logout(&self, did: &str, sid: &SessionId) -> Result<()> {
        if !self.registry.contains(did).await {
            return Err(RelayError::DeviceOffline(did.to_string()));
        }
        if self.registry.unbind_session(did, sid).await {
            if let Some(device) = self.registry.connection(did).await {
                device.send(Message::Logout {
                    did: Some(did.to_string()),
                    sid: sid.to_string(),
                });
            }
            tracing::info!(device = %did, session = %sid, "browser logged out");
        }
        Ok(())
    }
}
