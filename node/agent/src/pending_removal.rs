use crate::gossip::PeerSnapshot;

/// Staging queue for removal events observed while no leader exists (§2.6,
/// §4.5). Non-empty only while the local agent is a non-leader that has
/// observed a leader's disappearance (§3 invariant 5); drained on every
/// leadership transition whether or not the local agent was the winner.
#[derive(Debug, Default)]
pub struct PendingRemovalBuffer {
    events: Vec<PeerSnapshot>,
}

impl PendingRemovalBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Appends a departed leader's snapshot. Only the leader-removal case
    /// is ever buffered — §4.5 has non-leader observers ignore non-leader
    /// removals outright, so that filtering happens at the call site.
    pub fn push(&mut self, peer: PeerSnapshot) {
        self.events.push(peer);
        telemetry::metrics::PENDING_REMOVALS.set(self.events.len() as i64);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Clears the buffer without acting on its contents, e.g. on a remote
    /// `leader` sighting (§4.5).
    pub fn clear(&mut self) {
        self.events.clear();
        telemetry::metrics::PENDING_REMOVALS.set(0);
    }

    /// Drains every buffered event in insertion order, clearing the buffer.
    /// The caller runs the removal pipeline on each (§4.5).
    pub fn drain(&mut self) -> Vec<PeerSnapshot> {
        let drained = std::mem::take(&mut self.events);
        telemetry::metrics::PENDING_REMOVALS.set(0);
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use std::net::SocketAddr;

    fn snapshot(id: &str) -> PeerSnapshot {
        PeerSnapshot {
            id: id.to_string(),
            endpoint: "127.0.0.1:1".parse::<SocketAddr>().unwrap(),
            role: Role::Leader,
        }
    }

    #[test]
    fn drains_in_insertion_order_and_empties() {
        let mut buf = PendingRemovalBuffer::new();
        buf.push(snapshot("a"));
        buf.push(snapshot("b"));
        let drained = buf.drain();
        assert_eq!(drained.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_discards_without_acting() {
        let mut buf = PendingRemovalBuffer::new();
        buf.push(snapshot("a"));
        buf.clear();
        assert!(buf.is_empty());
    }
}
