use std::sync::Arc;

use crate::cloud::CloudAdapter;
use crate::gossip::{GossipEvent, PeerSnapshot};
use crate::naming::provisioned_name;
use crate::pending_removal::PendingRemovalBuffer;
use crate::registry::ServerRegistry;
use crate::types::{is_group_member, GroupConfig, GroupDefinition, NodeId};

/// Registers groups, reacts to membership events, and converges each group
/// to its `desiredSize` while this agent holds leadership (§4.5).
///
/// Owns every piece of shared mutable state the spec calls out as
/// single-writer (§5, §9 design notes): the Registry, the groups list, and
/// the Pending-Removal Buffer. All three are mutated only from this type's
/// methods, which the owning `Agent` calls one at a time off its serialized
/// gossip-event stream — never from two handlers concurrently.
pub struct GroupController<C: CloudAdapter> {
    cloud: Arc<C>,
    fleet_tag: String,
    registry: ServerRegistry,
    groups: Vec<GroupDefinition>,
    pending: PendingRemovalBuffer,
    is_leader: bool,
    /// Mirrors the source's `firstRun` flag, fixed per §9 Open Questions:
    /// the bootstrap rebalance fires exactly once per agent lifetime, on
    /// the first election this agent observes resolve (by winning it or by
    /// recognizing a remote winner) — not on every subsequent election.
    bootstrap_done: bool,
}

impl<C: CloudAdapter> GroupController<C> {
    pub fn new(cloud: Arc<C>, fleet_tag: String) -> Self {
        Self {
            cloud,
            fleet_tag,
            registry: ServerRegistry::new(),
            groups: Vec::new(),
            pending: PendingRemovalBuffer::new(),
            is_leader: false,
            bootstrap_done: false,
        }
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ServerRegistry {
        &mut self.registry
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Registers a group, returning its registration index — used by the
    /// floating-address sub-election to disambiguate `port + k` (§4.6).
    pub fn register_group(&mut self, config: GroupConfig) -> usize {
        self.groups.push(GroupDefinition {
            match_tags: config.match_tags,
            desired_size: config.desired_size,
            provisioning_template: config.provisioning_template,
            floating_address: config.floating_address,
        });
        self.groups.len() - 1
    }

    pub fn groups(&self) -> &[GroupDefinition] {
        &self.groups
    }

    /// Re-evaluates the affected groups and converges each while leading
    /// (§4.5). This is the single entry point the owning `Agent` feeds
    /// every `GossipEvent` through; handlers never run concurrently with
    /// each other because the caller awaits this before dispatching the
    /// next event (§5).
    pub async fn handle_event(&mut self, event: GossipEvent) {
        match event {
            GossipEvent::Added(peer) => self.on_added(peer).await,
            GossipEvent::Removed(peer) => self.on_removed(peer).await,
            GossipEvent::Elected => self.on_elected().await,
            GossipEvent::Leader(peer) => self.on_leader(peer).await,
        }
    }

    async fn on_added(&mut self, peer: PeerSnapshot) {
        match self.cloud.get(&peer.id).await {
            Ok(instance) => {
                self.registry.upsert(instance);
            }
            Err(e) => {
                tracing::warn!(id = %peer.id, error = %e, "failed to enrich newly added peer, will retry on next sighting");
            }
        }
        // §9 Open Questions: any observed leader role is authoritative for
        // clearing the buffer, whether seen via `added` or via `leader`.
        if peer.role == crate::types::Role::Leader {
            self.pending.clear();
            self.bootstrap_done = true;
        }
    }

    async fn on_removed(&mut self, peer: PeerSnapshot) {
        if self.is_leader {
            self.run_removal_pipeline(&peer.id).await;
            return;
        }
        if peer.role == crate::types::Role::Leader {
            self.pending.push(peer);
        }
        // A non-leader's removal, seen by a non-leader, is ignored (§4.5):
        // the eventual leader will observe it directly or via enrichment.
    }

    async fn on_elected(&mut self) {
        self.is_leader = true;
        let buffered = self.pending.drain();
        for peer in buffered {
            self.run_removal_pipeline(&peer.id).await;
        }
        if !self.bootstrap_done {
            self.balance_all().await;
            self.bootstrap_done = true;
        }
    }

    async fn on_leader(&mut self, _peer: PeerSnapshot) {
        self.is_leader = false;
        self.pending.clear();
        self.bootstrap_done = true;
    }

    /// Destroys `id` and removes it from the Registry, then re-balances
    /// every group the departed node belonged to (§4.5). Unknown ids are
    /// ignored — the Registry is the source of truth (§7).
    async fn run_removal_pipeline(&mut self, id: &NodeId) {
        let Some(node) = self.registry.get(id).cloned() else {
            tracing::debug!(%id, "removal for unknown id, ignoring");
            return;
        };

        match self.cloud.destroy(id).await {
            Ok(()) => telemetry::metrics::DESTROYS_ISSUED_TOTAL.inc(),
            Err(e) => tracing::warn!(%id, error = %e, "destroy failed, relying on next convergence pass"),
        }
        self.registry.remove(id);

        let affected: Vec<usize> = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, g)| is_group_member(&node.tags, &g.match_tags, &self.fleet_tag))
            .map(|(i, _)| i)
            .collect();
        for i in affected {
            self.balance_index(i).await;
        }
    }

    async fn balance_all(&mut self) {
        for i in 0..self.groups.len() {
            self.balance_index(i).await;
        }
    }

    /// Converges one group to `desiredSize` (§4.5 `balance`). A no-op when
    /// already converged — applying it twice with no intervening membership
    /// change issues no further calls (§8 round-trip law).
    async fn balance_index(&mut self, index: usize) {
        let group = &self.groups[index];
        let members = self.registry.by_group(group, &self.fleet_tag);
        let diff = group.desired_size as i64 - members.len() as i64;

        if diff > 0 {
            let template = group.provisioning_template.clone();
            for _ in 0..diff {
                let mut to_create = template.clone();
                to_create.name_base = provisioned_name(&template.name_base);
                match self.cloud.create(&to_create).await {
                    Ok(id) => {
                        telemetry::metrics::CREATES_ISSUED_TOTAL.inc();
                        tracing::info!(%id, name = %to_create.name_base, "issued create to converge group");
                    }
                    Err(e) => tracing::warn!(error = %e, "create failed, next balance pass will retry"),
                }
            }
        } else if diff < 0 {
            let surplus = (-diff) as usize;
            let victims: Vec<NodeId> = members.iter().take(surplus).map(|n| n.id.clone()).collect();
            for id in victims {
                match self.cloud.destroy(&id).await {
                    Ok(()) => telemetry::metrics::DESTROYS_ISSUED_TOTAL.inc(),
                    Err(e) => tracing::warn!(%id, error = %e, "destroy failed while shrinking group"),
                }
                self.registry.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{AddressKind, AddressRecord, CloudError, Instance, RegionRef};
    use std::collections::HashSet;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeCloud {
        instances: Mutex<std::collections::HashMap<String, Instance>>,
        created: Mutex<Vec<String>>,
        destroyed: Mutex<Vec<String>>,
        /// Number of `create` calls left to fail with `CloudError::Transient`
        /// before succeeding, simulating a transient IaaS failure (§7, §8
        /// scenario 6).
        create_failures_remaining: Mutex<u32>,
    }

    impl FakeCloud {
        fn seed(&self, id: &str, tags: &[&str]) {
            self.instances.lock().unwrap().insert(
                id.to_string(),
                Instance {
                    id: id.to_string(),
                    name: id.to_string(),
                    region: RegionRef { slug: "nyc1".to_string() },
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    addresses: vec![AddressRecord { kind: AddressKind::Private, address: "10.0.0.1:1".to_string() }],
                },
            );
        }
    }

    #[async_trait]
    impl CloudAdapter for FakeCloud {
        async fn list(&self, _tag: &str) -> Result<Vec<Instance>, CloudError> {
            Ok(self.instances.lock().unwrap().values().cloned().collect())
        }
        async fn get(&self, id: &NodeId) -> Result<Instance, CloudError> {
            self.instances
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| CloudError::Permanent("no such instance".to_string()))
        }
        async fn create(&self, template: &crate::types::ProvisioningTemplate) -> Result<NodeId, CloudError> {
            let mut remaining = self.create_failures_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CloudError::Transient("simulated rate limit".to_string()));
            }
            drop(remaining);
            let id = template.name_base.clone();
            self.created.lock().unwrap().push(id.clone());
            Ok(id)
        }
        async fn destroy(&self, id: &NodeId) -> Result<(), CloudError> {
            self.destroyed.lock().unwrap().push(id.clone());
            Ok(())
        }
        async fn assign_floating_address(&self, _address: &str, _id: &NodeId) -> Result<(), CloudError> {
            Ok(())
        }
    }

    fn snapshot(id: &str, role: crate::types::Role) -> PeerSnapshot {
        PeerSnapshot { id: id.to_string(), endpoint: "127.0.0.1:1".parse::<SocketAddr>().unwrap(), role }
    }

    fn group_config(tags: &[&str], desired: u32) -> GroupConfig {
        GroupConfig {
            match_tags: tags.iter().map(|t| t.to_string()).collect(),
            desired_size: desired,
            floating_address: None,
            provisioning_template: crate::types::ProvisioningTemplate {
                name_base: "web".to_string(),
                region: "nyc1".to_string(),
                size: "s-1vcpu-1gb".to_string(),
                image: "ubuntu-22-04".to_string(),
                ssh_keys: vec![],
                backups: false,
                ipv6: false,
                private_networking: false,
                user_data: None,
                monitoring: false,
                volumes: vec![],
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        }
    }

    #[tokio::test]
    async fn cold_start_creates_to_desired_size() {
        let cloud = Arc::new(FakeCloud::default());
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.register_group(group_config(&["ENV:T"], 2));

        controller.on_elected().await;

        assert_eq!(cloud.created.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn balance_twice_with_no_change_is_a_noop() {
        let cloud = Arc::new(FakeCloud::default());
        cloud.seed("a", &["ENV:T", "fleet"]);
        cloud.seed("b", &["ENV:T", "fleet"]);
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.registry_mut().upsert(cloud.get(&"a".to_string()).await.unwrap());
        controller.registry_mut().upsert(cloud.get(&"b".to_string()).await.unwrap());
        controller.register_group(group_config(&["ENV:T"], 2));

        controller.balance_all().await;
        controller.balance_all().await;

        assert!(cloud.created.lock().unwrap().is_empty());
        assert!(cloud.destroyed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_leader_ignores_citizen_removal() {
        let cloud = Arc::new(FakeCloud::default());
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.on_removed(snapshot("x", crate::types::Role::Citizen)).await;
        assert!(controller.pending.is_empty());
        assert!(cloud.destroyed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_leader_buffers_leader_removal_then_drains_on_election() {
        let cloud = Arc::new(FakeCloud::default());
        cloud.seed("leader-node", &["ENV:T", "fleet"]);
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.registry_mut().upsert(cloud.get(&"leader-node".to_string()).await.unwrap());
        controller.register_group(group_config(&["ENV:T"], 1));

        controller.on_removed(snapshot("leader-node", crate::types::Role::Leader)).await;
        assert_eq!(controller.pending.len(), 1);

        controller.on_elected().await;

        assert!(controller.pending.is_empty());
        assert_eq!(cloud.destroyed.lock().unwrap(), vec!["leader-node".to_string()]);
        assert_eq!(cloud.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn split_brain_predicate_excludes_extra_tagged_node() {
        let cloud = Arc::new(FakeCloud::default());
        cloud.seed("x", &["ENV:T", "TYPE:special", "fleet"]);
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.registry_mut().upsert(cloud.get(&"x".to_string()).await.unwrap());
        controller.register_group(group_config(&["ENV:T"], 0));

        controller.balance_all().await;

        assert!(cloud.destroyed.lock().unwrap().is_empty(), "x is not a member of the group, must not be touched");
    }

    #[tokio::test]
    async fn second_election_does_not_rebalance_again() {
        let cloud = Arc::new(FakeCloud::default());
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.register_group(group_config(&["ENV:T"], 2));

        controller.on_elected().await;
        assert_eq!(cloud.created.lock().unwrap().len(), 2);

        controller.on_leader(snapshot("other", crate::types::Role::Leader)).await;
        controller.on_elected().await;

        assert_eq!(cloud.created.lock().unwrap().len(), 2, "bootstrap rebalance must fire exactly once");
    }

    #[tokio::test]
    async fn desired_size_zero_drains_the_group() {
        let cloud = Arc::new(FakeCloud::default());
        cloud.seed("a", &["fleet"]);
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.registry_mut().upsert(cloud.get(&"a".to_string()).await.unwrap());
        controller.register_group(group_config(&[], 0));

        controller.balance_all().await;

        assert_eq!(cloud.destroyed.lock().unwrap(), vec!["a".to_string()]);
    }

    /// §8 scenario 2: one of two dies while the local agent is already
    /// leader. `on_removed` takes the `self.is_leader` branch directly —
    /// nothing is ever buffered, and the departed peer's destroy and the
    /// replacement create both happen synchronously within the one handler.
    #[tokio::test]
    async fn leader_destroys_a_removed_peer_directly_without_buffering() {
        let cloud = Arc::new(FakeCloud::default());
        cloud.seed("member", &["ENV:T", "fleet"]);
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.registry_mut().upsert(cloud.get(&"member".to_string()).await.unwrap());
        controller.register_group(group_config(&["ENV:T"], 1));
        controller.is_leader = true;

        controller.on_removed(snapshot("member", crate::types::Role::Citizen)).await;

        assert!(controller.pending.is_empty(), "leader handles removal directly, nothing is buffered");
        assert_eq!(cloud.destroyed.lock().unwrap(), vec!["member".to_string()]);
        assert_eq!(cloud.created.lock().unwrap().len(), 1, "removal re-triggers balance back to desired size");
    }

    /// §8 scenario 6: a transient `create` failure leaves the registry
    /// unchanged and is retried on the next balance pass, without this
    /// layer retrying on its own (§7: "no retries at this layer").
    #[tokio::test]
    async fn transient_create_failure_is_retried_on_next_balance_pass() {
        let cloud = Arc::new(FakeCloud::default());
        *cloud.create_failures_remaining.lock().unwrap() = 1;
        let mut controller = GroupController::new(cloud.clone(), "fleet".to_string());
        controller.register_group(group_config(&["ENV:T"], 1));

        controller.balance_all().await;
        assert!(cloud.created.lock().unwrap().is_empty(), "the failed create issues no node");

        controller.balance_all().await;
        assert_eq!(cloud.created.lock().unwrap().len(), 1, "the next balance pass retries and succeeds");
    }
}
