use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{NodeId, ProvisioningTemplate};

/// Why a Cloud Adapter call failed (§7). The Group Controller never retries
/// at this layer either way, but it logs the two kinds differently: a
/// transient failure reconverges on the next balance pass, a permanent one
/// oscillates until an operator notices via logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// Network error, rate limit, 5xx: the next balance pass will retry.
    Transient(String),
    /// Auth failure, malformed template: retrying will not help.
    Permanent(String),
}

impl std::fmt::Display for CloudError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CloudError::Transient(msg) => write!(f, "transient cloud error: {}", msg),
            CloudError::Permanent(msg) => write!(f, "permanent cloud error: {}", msg),
        }
    }
}

impl std::error::Error for CloudError {}

/// One address a provider instance carries, tagged by kind (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub kind: AddressKind,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Private,
    Public,
}

/// The instance payload shape returned by the provider (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: NodeId,
    pub name: String,
    pub region: RegionRef,
    pub tags: HashSet<String>,
    pub addresses: Vec<AddressRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRef {
    pub slug: String,
}

/// The IaaS control-plane operations the core invokes (§4.3). This is the
/// spec's external-collaborator contract: the core depends only on this
/// trait, never on a concrete provider client.
#[async_trait]
pub trait CloudAdapter: Send + Sync {
    /// Lists every instance carrying `tag`, used once at bootstrap.
    async fn list(&self, tag: &str) -> Result<Vec<Instance>, CloudError>;

    /// Fetches one instance, used to enrich a newcomer observed via `added`.
    async fn get(&self, id: &NodeId) -> Result<Instance, CloudError>;

    /// Requests a new instance. Non-blocking with respect to group logic:
    /// the created instance will appear via gossip later, not from this call.
    async fn create(&self, template: &ProvisioningTemplate) -> Result<NodeId, CloudError>;

    /// Destroys an instance. Idempotent from the core's perspective —
    /// repeated destroys for the same id are tolerated.
    async fn destroy(&self, id: &NodeId) -> Result<(), CloudError>;

    /// Reassigns a floating address to the named instance.
    async fn assign_floating_address(&self, address: &str, id: &NodeId) -> Result<(), CloudError>;
}
