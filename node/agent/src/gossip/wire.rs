use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// One peer endpoint as carried inside a `hello` message (§4.2, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddr {
    pub id: String,
    pub endpoint: SocketAddr,
}

/// The gossip wire message: `{id, role, knownPeers}` (§4.2, §6). The exact
/// on-the-wire encoding is a substrate concern (§6) — this implementation
/// uses JSON, since the fleet runs one build and interop is explicitly not
/// required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    pub id: String,
    pub role: Role,
    #[serde(rename = "knownPeers")]
    pub known_peers: Vec<PeerAddr>,
}

impl HelloMessage {
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("HelloMessage always serializes")
    }

    /// Malformed messages are dropped, not propagated as an error (§7).
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}
