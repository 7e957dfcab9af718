use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cloud::CloudAdapter;
use crate::gossip::{GossipConfig, GossipEngine, GossipEvent, GossipHandle};
use crate::types::NodeId;

/// Tighter heartbeat/timeout than the fleet engine (§4.6): this election
/// governs a client-visible address flip, so staleness must be caught fast.
pub const SUB_ELECTION_HEARTBEAT: Duration = Duration::from_millis(3000);
pub const SUB_ELECTION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// A second `GossipEngine` scoped to one group's members, whose sole purpose
/// is to reassign a mobile address to whichever member wins it (§4.6).
///
/// Bound to `port + 1 + k`, where `k` is the group's registration index, so
/// multiple concurrent sub-elections on the same host don't collide with
/// each other — and, critically, don't collide with the fleet-wide engine's
/// own `port` binding when `k` is 0.
pub struct FloatingAddressElection {
    handle: GossipHandle,
    runner: tokio::task::JoinHandle<()>,
}

impl FloatingAddressElection {
    /// Spawns the sub-election's own dispatch loop and its single
    /// subscriber, which calls `assign_floating_address` on `elected(self)`.
    /// The Cloud Adapter handle is passed in at construction rather than
    /// held via a back-reference to the enclosing agent (§9 design notes),
    /// resolving what would otherwise be a cyclic reference between the
    /// sub-election and the agent that owns it.
    pub async fn spawn<C: CloudAdapter + 'static>(
        local_id: NodeId,
        bind_port_base: u16,
        group_index: usize,
        peer_endpoints: Vec<SocketAddr>,
        floating_address: String,
        cloud: Arc<C>,
    ) -> std::io::Result<Self> {
        let bind_addr: SocketAddr =
            format!("0.0.0.0:{}", bind_port_base + 1 + group_index as u16).parse().expect("valid socket addr");

        let config = GossipConfig {
            local_id: local_id.clone(),
            bind_addr,
            initial_peers: peer_endpoints,
            interval: SUB_ELECTION_HEARTBEAT,
            timeout: SUB_ELECTION_TIMEOUT,
        };

        let (event_tx, mut event_rx) = mpsc::channel(64);
        let (engine, handle) = GossipEngine::new(config, event_tx).await?;

        let runner = tokio::spawn(engine.run());

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if let GossipEvent::Elected = event {
                    match cloud.assign_floating_address(&floating_address, &local_id).await {
                        Ok(()) => tracing::info!(%local_id, address = %floating_address, "assigned floating address"),
                        Err(e) => tracing::warn!(%local_id, address = %floating_address, error = %e, "floating address assignment failed"),
                    }
                }
            }
        });

        Ok(Self { handle, runner })
    }

    pub fn is_leader(&self) -> bool {
        self.handle.is_leader()
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
        let _ = self.runner.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CloudError, Instance};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCloud {
        assigned: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CloudAdapter for RecordingCloud {
        async fn list(&self, _tag: &str) -> Result<Vec<Instance>, CloudError> {
            Ok(vec![])
        }
        async fn get(&self, _id: &NodeId) -> Result<Instance, CloudError> {
            Err(CloudError::Permanent("unused in this test".to_string()))
        }
        async fn create(&self, _template: &crate::types::ProvisioningTemplate) -> Result<NodeId, CloudError> {
            Err(CloudError::Permanent("unused in this test".to_string()))
        }
        async fn destroy(&self, _id: &NodeId) -> Result<(), CloudError> {
            Ok(())
        }
        async fn assign_floating_address(&self, address: &str, id: &NodeId) -> Result<(), CloudError> {
            self.assigned.lock().unwrap().push((address.to_string(), id.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn lone_member_elects_itself_and_assigns_the_address() {
        let cloud = Arc::new(RecordingCloud::default());
        let election = FloatingAddressElection::spawn(
            "solo".to_string(),
            20000,
            0,
            vec![],
            "203.0.113.5".to_string(),
            cloud.clone(),
        )
        .await
        .unwrap();

        // The sole member elects itself after a random backoff bounded by
        // the sub-election's own heartbeat interval (§4.2); wait past the
        // worst case.
        tokio::time::sleep(SUB_ELECTION_HEARTBEAT + Duration::from_millis(300)).await;

        assert!(election.is_leader());
        assert_eq!(cloud.assigned.lock().unwrap().as_slice(), &[("203.0.113.5".to_string(), "solo".to_string())]);

        election.shutdown().await;
    }
}
