use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque token identifying one browser↔device pairing.
///
/// Derived from the device id plus a random nonce so a browser cannot
/// guess another session's token. Unique only within one device's session
/// set; the broker retries on the (vanishingly rare) collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh token for a login against `did`.
    pub fn mint(did: &str) -> Self {
        let nonce: u128 = rand::random();
        let mut hasher = Sha256::new();
        hasher.update(did.as_bytes());
        hasher.update(nonce.to_le_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
