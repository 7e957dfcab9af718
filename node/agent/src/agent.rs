use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::cloud::CloudAdapter;
use crate::error::AgentError;
use crate::floating_address::FloatingAddressElection;
use crate::gossip::{GossipConfig, GossipEngine, GossipEvent, GossipHandle};
use crate::group_controller::GroupController;
use crate::identity::IdentityProvider;
use crate::types::{AgentConfig, GroupConfig, NodeId};

/// The long-running process on one node (GLOSSARY). Wires the Cloud
/// Adapter, the identity provider, the Registry-owning `GroupController`,
/// and one fleet-wide `GossipEngine` together (§2 data flow).
pub struct Agent<C: CloudAdapter> {
    config: AgentConfig,
    cloud: Arc<C>,
    local_id: NodeId,
    controller: Arc<Mutex<GroupController<C>>>,
    gossip_handle: Option<GossipHandle>,
    floating_elections: Vec<FloatingAddressElection>,
}

impl<C: CloudAdapter + 'static> Agent<C> {
    /// Bootstraps the Registry from the Cloud Adapter's listing, resolves
    /// the local instance id via `identity`, and verifies it is present in
    /// that listing (§9 Open Questions: absence is fatal, unlike the
    /// source, where this was left undefined).
    pub async fn bootstrap(
        config: AgentConfig,
        cloud: Arc<C>,
        identity: &(impl IdentityProvider + ?Sized),
    ) -> Result<Self, AgentError> {
        let local_id = identity
            .self_id()
            .await
            .map_err(|e| AgentError::IdentityUnavailable(e.to_string()))?;

        let instances = cloud
            .list(&config.fleet_tag)
            .await
            .map_err(|e| AgentError::BootstrapListFailed(e.to_string()))?;

        let self_present = instances.iter().any(|i| i.id == local_id);
        if !self_present {
            return Err(AgentError::SelfNotInFleet(local_id));
        }

        let mut controller = GroupController::new(cloud.clone(), config.fleet_tag.clone());
        for instance in instances {
            controller.registry_mut().upsert(instance);
        }

        Ok(Self {
            config,
            cloud,
            local_id,
            controller: Arc::new(Mutex::new(controller)),
            gossip_handle: None,
            floating_elections: Vec::new(),
        })
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Registers a group definition, returning its index (used to derive
    /// the floating-address sub-election's port, §4.6).
    pub async fn register_group(&self, config: GroupConfig) -> usize {
        self.controller.lock().await.register_group(config)
    }

    pub fn gossip_handle(&self) -> Option<GossipHandle> {
        self.gossip_handle.clone()
    }

    /// Seeds the fleet-wide `GossipEngine` with peer endpoints drawn from
    /// the already-bootstrapped Registry (§2), spawns its dispatch loop,
    /// and forwards every emitted event into the `GroupController` — one
    /// at a time, off the gossip engine's own dispatch path (§5), so a slow
    /// Cloud Adapter call never blocks heartbeat or timeout processing.
    pub async fn run(mut self) -> std::io::Result<()> {
        let initial_peers: Vec<SocketAddr> = {
            let controller = self.controller.lock().await;
            controller
                .registry()
                .all()
                .filter(|n| n.id != self.local_id)
                .filter_map(|n| n.reachable_endpoint())
                .collect()
        };

        let bind_addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse().expect("valid socket addr");
        let gossip_config = GossipConfig {
            local_id: self.local_id.clone(),
            bind_addr,
            initial_peers,
            interval: std::time::Duration::from_millis(self.config.interval_ms),
            timeout: std::time::Duration::from_millis(self.config.timeout_ms),
        };

        let (event_tx, mut event_rx) = mpsc::channel(256);
        let (engine, handle) = GossipEngine::new(gossip_config, event_tx).await?;
        self.gossip_handle = Some(handle.clone());

        self.floating_elections = self.spawn_floating_elections().await?;

        let engine_task = tokio::spawn(engine.run());

        let controller = self.controller.clone();
        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(event) => {
                            log_event(&event);
                            // The coarse lock is held only for the duration of
                            // this one handler dispatch, never across an
                            // await on a Cloud Adapter call's own internal
                            // I/O beyond what the handler itself awaits (§5,
                            // §9 design notes): there is exactly one writer
                            // of the Registry/groups/pending-removal state
                            // at any instant.
                            controller.lock().await.handle_event(event).await;
                        }
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received, stopping gossip engine");
                    handle.shutdown().await;
                    break;
                }
            }
        }

        let _ = engine_task.await;
        for election in self.floating_elections {
            election.shutdown().await;
        }
        Ok(())
    }

    /// For every group declaring a `floatingAddress` whose local agent is
    /// itself a member, instantiates a sub-election scoped to that group's
    /// current membership (§4.6).
    async fn spawn_floating_elections(&self) -> std::io::Result<Vec<FloatingAddressElection>> {
        let controller = self.controller.lock().await;
        let mut elections = Vec::new();

        for (index, group) in controller.groups().iter().enumerate() {
            let Some(address) = &group.floating_address else { continue };
            let members = controller.registry().by_group(group, &self.config.fleet_tag);
            if !members.iter().any(|n| n.id == self.local_id) {
                continue;
            }
            let peer_endpoints: Vec<SocketAddr> = members
                .iter()
                .filter(|n| n.id != self.local_id)
                .filter_map(|n| n.reachable_endpoint())
                .collect();

            let election = FloatingAddressElection::spawn(
                self.local_id.clone(),
                self.config.port,
                index,
                peer_endpoints,
                address.clone(),
                self.cloud.clone(),
            )
            .await?;
            elections.push(election);
        }

        Ok(elections)
    }
}

fn log_event(event: &GossipEvent) {
    match event {
        GossipEvent::Added(peer) => tracing::info!(id = %peer.id, "peer added"),
        GossipEvent::Removed(peer) => tracing::info!(id = %peer.id, role = ?peer.role, "peer removed"),
        GossipEvent::Elected => tracing::info!("local agent elected leader"),
        GossipEvent::Leader(peer) => tracing::info!(id = %peer.id, "recognized remote leader"),
    }
}
