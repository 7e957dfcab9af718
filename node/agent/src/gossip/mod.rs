mod election;
mod peer_table;
mod wire;

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};

use crate::transport::{DatagramTransport, MAX_MESSAGE_BYTES};
use crate::types::Role;

use peer_table::PeerTable;
pub use wire::PeerAddr;
use wire::HelloMessage;

/// Construction-time configuration for one `GossipEngine` instance (§4.2).
#[derive(Debug, Clone)]
pub struct GossipConfig {
    pub local_id: String,
    pub bind_addr: SocketAddr,
    pub initial_peers: Vec<SocketAddr>,
    pub interval: Duration,
    pub timeout: Duration,
}

/// A snapshot of a peer's identity at the moment an event fired (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub id: String,
    pub endpoint: SocketAddr,
    pub role: Role,
}

/// Lifecycle events the engine emits to its subscriber, in decision order
/// (§4.2). Event delivery is serialized: no two fire concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipEvent {
    Added(PeerSnapshot),
    Removed(PeerSnapshot),
    Elected,
    Leader(PeerSnapshot),
}

enum GossipCommand {
    Shutdown,
}

/// A cheap, cloneable handle to a running `GossipEngine` (§4.2's `isLeader()`
/// query), held by whatever owns the engine without needing to reach into
/// its dispatch loop.
#[derive(Clone)]
pub struct GossipHandle {
    command_tx: mpsc::Sender<GossipCommand>,
    is_leader: Arc<AtomicBool>,
}

impl GossipHandle {
    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(GossipCommand::Shutdown).await;
    }
}

/// Peer discovery, liveness, and leader election over an unreliable
/// datagram transport (§4.2). Every event handler for this engine is
/// serialized; the engine never dispatches two events concurrently (§5).
pub struct GossipEngine {
    config: GossipConfig,
    transport: DatagramTransport,
    peers: PeerTable,
    local_role: Role,
    known_leader_id: Option<String>,
    election_deadline: Option<Pin<Box<Sleep>>>,
    event_tx: mpsc::Sender<GossipEvent>,
    command_rx: mpsc::Receiver<GossipCommand>,
    is_leader: Arc<AtomicBool>,
}

impl GossipEngine {
    pub async fn new(
        config: GossipConfig,
        event_tx: mpsc::Sender<GossipEvent>,
    ) -> std::io::Result<(Self, GossipHandle)> {
        let transport = DatagramTransport::bind(config.bind_addr).await?;
        let (command_tx, command_rx) = mpsc::channel(16);
        let is_leader = Arc::new(AtomicBool::new(false));

        let engine = Self {
            config,
            transport,
            peers: PeerTable::new(),
            local_role: Role::Citizen,
            known_leader_id: None,
            election_deadline: None,
            event_tx,
            command_rx,
            is_leader: is_leader.clone(),
        };
        let handle = GossipHandle { command_tx, is_leader };
        Ok((engine, handle))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Drives the engine until `shutdown()` is called on its handle. This is
    /// the engine's one dispatch loop: every branch below runs to completion
    /// before the next is selected, so handlers never interleave (§5).
    pub async fn run(mut self) {
        let mut heartbeat = tokio::time::interval(self.config.interval.max(Duration::from_millis(1)));
        let mut sweep = tokio::time::interval((self.config.timeout / 4).max(Duration::from_millis(1)));
        let mut buf = vec![0u8; MAX_MESSAGE_BYTES];

        // A lone agent with no peers never receives a datagram, so without
        // this call it would never discover it is leaderless and never
        // schedule its own election (§8 scenario 1: cold start, empty fleet).
        self.recompute_leadership().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    self.broadcast_hello().await;
                }
                _ = sweep.tick() => {
                    self.sweep_timeouts().await;
                }
                _ = Self::election_timer(&mut self.election_deadline) => {
                    self.election_deadline = None;
                    self.fire_election_if_still_leaderless().await;
                }
                recv = self.transport.recv(&mut buf) => {
                    if let Ok((n, from)) = recv {
                        self.handle_datagram(&buf[..n], from).await;
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(GossipCommand::Shutdown) | None => break,
                    }
                }
            }
        }
    }

    async fn election_timer(deadline: &mut Option<Pin<Box<Sleep>>>) {
        match deadline {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }

    async fn broadcast_hello(&mut self) {
        let hello = HelloMessage {
            id: self.config.local_id.clone(),
            role: self.local_role,
            known_peers: self.peers.known_peer_addrs(),
        };
        let payload = hello.encode();

        let mut targets = self.peers.endpoints();
        for seed in &self.config.initial_peers {
            if !targets.contains(seed) {
                targets.push(*seed);
            }
        }
        for addr in targets {
            self.transport.send(addr, &payload).await;
        }
    }

    async fn sweep_timeouts(&mut self) {
        let timed_out = self.peers.timed_out(self.config.timeout);
        for id in timed_out {
            let Some(entry) = self.peers.get(&id) else { continue };
            let snapshot = PeerSnapshot { id: id.clone(), endpoint: entry.endpoint, role: entry.role };
            self.peers.mark_removed(&id);
            telemetry::metrics::PEERS_REMOVED_TOTAL.inc();
            let _ = self.event_tx.send(GossipEvent::Removed(snapshot)).await;
            self.recompute_leadership().await;
        }
    }

    async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let Some(hello) = HelloMessage::decode(bytes) else {
            tracing::debug!(%from, "dropping malformed gossip message");
            return;
        };
        if hello.id == self.config.local_id {
            return;
        }

        let is_new = !self.peers.contains(&hello.id);
        if is_new {
            self.peers.insert_new(hello.id.clone(), from, hello.role);
            telemetry::metrics::PEERS_ADDED_TOTAL.inc();
            let snapshot = PeerSnapshot { id: hello.id.clone(), endpoint: from, role: hello.role };
            let _ = self.event_tx.send(GossipEvent::Added(snapshot)).await;
        } else {
            self.peers.touch(&hello.id, from, hello.role);
        }

        for known in &hello.known_peers {
            if known.id == self.config.local_id {
                continue;
            }
            if !self.peers.contains(&known.id) {
                self.peers.insert_new(known.id.clone(), known.endpoint, Role::Citizen);
                telemetry::metrics::PEERS_ADDED_TOTAL.inc();
                let snapshot = PeerSnapshot { id: known.id.clone(), endpoint: known.endpoint, role: Role::Citizen };
                let _ = self.event_tx.send(GossipEvent::Added(snapshot)).await;
            }
        }

        self.recompute_leadership().await;
    }

    /// Recomputes the fleet's (as seen locally) current leader after any
    /// state change, applying the deterministic lowest-id tie-break and
    /// scheduling an election backoff if no leader is known (§4.2).
    async fn recompute_leadership(&mut self) {
        let self_is_leader = self.local_role == Role::Leader;
        let remote_leader = self.peers.alive_leader().map(|(id, e)| (id.to_string(), e.endpoint, e.role));

        let winner_is_remote = match &remote_leader {
            Some((remote_id, _, _)) => !self_is_leader || *remote_id < self.config.local_id,
            None => false,
        };

        if !self_is_leader && remote_leader.is_none() {
            self.known_leader_id = None;
            self.schedule_election_if_needed();
            return;
        }

        if !winner_is_remote {
            // Either we hold leadership uncontested, or we are about to
            // (the election timer handles the actual promotion).
            if self_is_leader {
                self.known_leader_id = Some(self.config.local_id.clone());
            }
            return;
        }

        let (winner_id, endpoint, role) = remote_leader.expect("winner_is_remote implies Some");
        if self_is_leader {
            tracing::info!(winner = %winner_id, "lost election tie-break, reverting to citizen");
            self.local_role = Role::Citizen;
            self.is_leader.store(false, Ordering::SeqCst);
        }
        let newly_recognized = self.known_leader_id.as_deref() != Some(winner_id.as_str());
        self.known_leader_id = Some(winner_id.clone());
        if newly_recognized {
            let snapshot = PeerSnapshot { id: winner_id, endpoint, role };
            let _ = self.event_tx.send(GossipEvent::Leader(snapshot)).await;
        }
    }

    fn schedule_election_if_needed(&mut self) {
        if self.election_deadline.is_some() || self.local_role == Role::Leader {
            return;
        }
        let backoff = election::election_backoff(self.config.interval);
        self.election_deadline = Some(Box::pin(tokio::time::sleep_until(Instant::now() + backoff)));
    }

    async fn fire_election_if_still_leaderless(&mut self) {
        if self.peers.alive_leader().is_some() || self.local_role == Role::Leader {
            return;
        }
        self.local_role = Role::Leader;
        self.known_leader_id = Some(self.config.local_id.clone());
        self.is_leader.store(true, Ordering::SeqCst);
        telemetry::metrics::ELECTIONS_WON_TOTAL.inc();
        telemetry::metrics::IS_LEADER.set(1);
        self.broadcast_hello().await;
        let _ = self.event_tx.send(GossipEvent::Elected).await;
    }
}
