//! Device registry: maps device ids to their live connection, liveness
//! budget, and bound browser sessions.
//!
//! All mutation goes through the single lock inside [`DeviceRegistry`];
//! connection tasks and the sweeper only ever hold cloned handles.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use ttylink_common::{Message, SessionId};

/// Liveness budget granted on registration and restored by any
/// proof-of-life.
pub const LIVENESS_BUDGET: u8 = 3;

/// Depth of each connection's outbound queue.
const SEND_QUEUE_DEPTH: usize = 256;

/// Outbound frames queued for a connection's write loop.
#[derive(Debug)]
pub enum Frame {
    Message(Message),
    Close,
}

/// Sending half of one connection's outbound queue.
///
/// Sends never block: a peer that falls behind and fills its queue loses
/// the frame instead of stalling the registry or the other peer.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    /// Create a handle together with the receiving end its connection
    /// task drains.
    pub fn channel() -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    pub fn send(&self, msg: Message) {
        match self.tx.try_send(Frame::Message(msg)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("outbound queue full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Ask the connection task to close its socket.
    pub fn close(&self) {
        let _ = self.tx.try_send(Frame::Close);
    }

    /// Whether both handles feed the same connection's queue.
    pub fn same_channel(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Outcome of binding a session id under a device.
#[derive(Debug, PartialEq, Eq)]
pub enum Bind {
    Bound,
    /// The id is already taken within this device's session set.
    Collision,
    DeviceGone,
}

struct DeviceEntry {
    conn: ConnectionHandle,
    liveness: u8,
    sessions: HashMap<SessionId, ConnectionHandle>,
}

/// Thread-safe registry of connected devices. Cheap to clone.
#[derive(Clone)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<String, DeviceEntry>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Install a fresh entry for `did`. Returns false if the id is
    /// already registered; the existing entry is left untouched and the
    /// caller must reject the new connection.
    pub async fn register(&self, did: &str, conn: ConnectionHandle) -> bool {
        let mut devices = self.devices.write().await;
        if devices.contains_key(did) {
            return false;
        }
        devices.insert(
            did.to_string(),
            DeviceEntry {
                conn,
                liveness: LIVENESS_BUDGET,
                sessions: HashMap::new(),
            },
        );
        true
    }

    /// Restore the liveness budget of `did`. No-op for unknown ids.
    pub async fn touch(&self, did: &str) {
        if let Some(entry) = self.devices.write().await.get_mut(did) {
            entry.liveness = LIVENESS_BUDGET;
        }
    }

    /// Remove `did` and tear down its connection and every bound session.
    pub async fn evict(&self, did: &str) {
        let entry = self.devices.write().await.remove(did);
        if let Some(entry) = entry {
            tracing::info!(device = %did, "device removed");
            teardown(did, entry);
        }
    }

    /// Remove `did` only if the entry is still backed by `conn`.
    ///
    /// Disconnect cleanup uses this instead of [`Self::evict`]: the
    /// sweeper may already have evicted the task's entry and the id may
    /// have been re-registered by a reconnect, and a late cleanup must
    /// not tear down that fresh registration.
    pub async fn evict_if(&self, did: &str, conn: &ConnectionHandle) -> bool {
        let entry = {
            let mut devices = self.devices.write().await;
            match devices.get(did) {
                Some(entry) if entry.conn.same_channel(conn) => devices.remove(did),
                _ => None,
            }
        };
        match entry {
            Some(entry) => {
                tracing::info!(device = %did, "device removed");
                teardown(did, entry);
                true
            }
            None => false,
        }
    }

    /// Decrement every device's liveness budget, evicting the ones that
    /// reach zero. Called once per sweep tick.
    pub async fn decrement_all(&self) {
        let evicted: Vec<(String, DeviceEntry)> = {
            let mut devices = self.devices.write().await;
            let expired: Vec<String> = devices
                .iter_mut()
                .filter_map(|(did, entry)| {
                    entry.liveness = entry.liveness.saturating_sub(1);
                    (entry.liveness == 0).then(|| did.clone())
                })
                .collect();
            expired
                .into_iter()
                .filter_map(|did| devices.remove(&did).map(|entry| (did, entry)))
                .collect()
        };
        for (did, entry) in evicted {
            tracing::info!(device = %did, "evicting unresponsive device");
            teardown(&did, entry);
        }
    }

    /// Bind `browser` under `(did, sid)`. Fails on an unknown device or a
    /// session id collision; the check and the insert happen under one
    /// lock acquisition.
    pub async fn bind_session(
        &self,
        did: &str,
        sid: SessionId,
        browser: ConnectionHandle,
    ) -> Bind {
        let mut devices = self.devices.write().await;
        let Some(entry) = devices.get_mut(did) else {
            return Bind::DeviceGone;
        };
        if entry.sessions.contains_key(&sid) {
            return Bind::Collision;
        }
        entry.sessions.insert(sid, browser);
        Bind::Bound
    }

    /// Drop the binding for `(did, sid)`. Returns whether it existed.
    pub async fn unbind_session(&self, did: &str, sid: &SessionId) -> bool {
        match self.devices.write().await.get_mut(did) {
            Some(entry) => entry.sessions.remove(sid).is_some(),
            None => false,
        }
    }

    /// The device's own connection handle.
    pub async fn connection(&self, did: &str) -> Option<ConnectionHandle> {
        self.devices.read().await.get(did).map(|e| e.conn.clone())
    }

    /// The browser handle bound under `(did, sid)`.
    pub async fn session(&self, did: &str, sid: &SessionId) -> Option<ConnectionHandle> {
        self.devices
            .read()
            .await
            .get(did)?
            .sessions
            .get(sid)
            .cloned()
    }

    pub async fn contains(&self, did: &str) -> bool {
        self.devices.read().await.contains_key(did)
    }

    /// Ids of all currently registered devices.
    pub async fn device_ids(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// Number of registered devices.
    pub async fn count(&self) -> usize {
        self.devices.read().await.len()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Close a removed entry's connection and notify every bound browser
/// before closing it.
fn teardown(did: &str, entry: DeviceEntry) {
    for (sid, browser) in entry.sessions {
        browser.send(Message::Logout {
            did: Some(did.to_string()),
            sid: sid.to_string(),
        });
        browser.close();
    }
    entry.conn.close();
}

#[cfg(test)]
impl DeviceRegistry {
    pub(crate) async fn liveness(&self, did: &str) -> Option<u8> {
        self.devices.read().await.get(did).map(|e| e.liveness)
    }
}
