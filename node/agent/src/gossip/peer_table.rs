use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::types::{PeerStatus, Role};

#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub endpoint: SocketAddr,
    pub last_heard: Instant,
    pub role: Role,
    pub status: PeerStatus,
}

/// Per-engine view of {who is up, who is leader} (§4.2). Owned entirely by
/// one `GossipEngine`; never shared or locked from outside the engine's
/// dispatch loop.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<String, PeerEntry>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self { peers: HashMap::new() }
    }

    pub fn get(&self, id: &str) -> Option<&PeerEntry> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    /// Inserts a never-before-seen peer as `Alive`/`Citizen`.
    pub fn insert_new(&mut self, id: String, endpoint: SocketAddr, role: Role) {
        self.peers.insert(
            id,
            PeerEntry {
                endpoint,
                last_heard: Instant::now(),
                role,
                status: PeerStatus::Alive,
            },
        );
    }

    /// Refreshes an existing, still-alive peer's heartbeat and claimed role.
    pub fn touch(&mut self, id: &str, endpoint: SocketAddr, role: Role) {
        if let Some(entry) = self.peers.get_mut(id) {
            entry.endpoint = endpoint;
            entry.last_heard = Instant::now();
            entry.role = role;
        }
    }

    pub fn set_role(&mut self, id: &str, role: Role) {
        if let Some(entry) = self.peers.get_mut(id) {
            entry.role = role;
        }
    }

    /// Marks a peer removed without evicting its entry — its last-known
    /// role is preserved for the `Removed` event consumers see (§4.2).
    pub fn mark_removed(&mut self, id: &str) {
        if let Some(entry) = self.peers.get_mut(id) {
            entry.status = PeerStatus::Removed;
        }
    }

    /// Every peer whose `last_heard` is older than `timeout` and still
    /// `Alive`, i.e. candidates for the next `Removed` sweep.
    pub fn timed_out(&self, timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        self.peers
            .iter()
            .filter(|(_, e)| e.status == PeerStatus::Alive && now.duration_since(e.last_heard) >= timeout)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// The lowest-id peer currently `Alive` and claiming `Leader`, if any.
    pub fn alive_leader(&self) -> Option<(&str, &PeerEntry)> {
        self.peers
            .iter()
            .filter(|(_, e)| e.status == PeerStatus::Alive && e.role == Role::Leader)
            .min_by(|(id_a, _), (id_b, _)| id_a.cmp(id_b))
            .map(|(id, e)| (id.as_str(), e))
    }

    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.peers.values().map(|e| e.endpoint).collect()
    }

    pub fn known_peer_addrs(&self) -> Vec<super::wire::PeerAddr> {
        self.peers
            .iter()
            .map(|(id, e)| super::wire::PeerAddr { id: id.clone(), endpoint: e.endpoint })
            .collect()
    }
}

