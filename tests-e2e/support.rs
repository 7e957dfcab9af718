use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use fleet_agent::cloud::{AddressKind, AddressRecord, CloudAdapter, CloudError, Instance, RegionRef};
use fleet_agent::types::{AgentConfig, NodeId, ProvisioningTemplate};

/// Shared in-memory stand-in for the IaaS provider (§4.3), backing every
/// scenario test in this crate. `Arc<Mutex<...>>`-free here because the
/// `CloudAdapter` trait itself only asks for `Send + Sync`, and each field
/// is independently mutexed — several `Agent`s hold the same `Arc<FakeCloud>`
/// and call into it concurrently, exactly like the real provider would see
/// concurrent calls from several fleet members.
#[derive(Default)]
pub struct FakeCloud {
    instances: Mutex<HashMap<String, Instance>>,
    pub created: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
    pub floating_assignments: Mutex<Vec<(String, String)>>,
}

impl FakeCloud {
    /// Seeds one instance as though it had already been provisioned before
    /// this test's agents booted, reachable at `endpoint`.
    pub fn seed(&self, id: &str, tags: &[&str], endpoint: SocketAddr) {
        self.instances.lock().unwrap().insert(
            id.to_string(),
            Instance {
                id: id.to_string(),
                name: id.to_string(),
                region: RegionRef { slug: "nyc1".to_string() },
                tags: tags.iter().map(|t| t.to_string()).collect(),
                addresses: vec![AddressRecord { kind: AddressKind::Private, address: endpoint.to_string() }],
            },
        );
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn destroyed_count_for(&self, id: &str) -> usize {
        self.destroyed.lock().unwrap().iter().filter(|d| d.as_str() == id).count()
    }
}

#[async_trait]
impl CloudAdapter for FakeCloud {
    async fn list(&self, tag: &str) -> Result<Vec<Instance>, CloudError> {
        Ok(self.instances.lock().unwrap().values().filter(|i| i.tags.contains(tag)).cloned().collect())
    }

    async fn get(&self, id: &NodeId) -> Result<Instance, CloudError> {
        self.instances
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::Permanent(format!("no such instance: {}", id)))
    }

    async fn create(&self, template: &ProvisioningTemplate) -> Result<NodeId, CloudError> {
        let id = template.name_base.clone();
        self.created.lock().unwrap().push(id.clone());
        Ok(id)
    }

    async fn destroy(&self, id: &NodeId) -> Result<(), CloudError> {
        self.destroyed.lock().unwrap().push(id.clone());
        self.instances.lock().unwrap().remove(id);
        Ok(())
    }

    async fn assign_floating_address(&self, address: &str, id: &NodeId) -> Result<(), CloudError> {
        self.floating_assignments.lock().unwrap().push((address.to_string(), id.to_string()));
        Ok(())
    }
}

/// Fast timing so tests exercise real heartbeat/timeout behavior without
/// real-world wall-clock waits (§8's scenarios are timing-sensitive by
/// nature; we just compress the clock rather than faking it).
pub fn fast_agent_config(fleet_tag: &str, port: u16) -> AgentConfig {
    AgentConfig {
        key: String::new(),
        fleet_tag: fleet_tag.to_string(),
        timeout_ms: 250,
        interval_ms: 60,
        port,
    }
}

pub fn loopback(port: u16) -> SocketAddr {
    format!("127.0.0.1:{}", port).parse().unwrap()
}

pub async fn settle(duration_ms: u64) {
    tokio::time::sleep(Duration::from_millis(duration_ms)).await;
}
