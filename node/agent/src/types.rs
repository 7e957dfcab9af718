use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Opaque provider instance id. Stable, the Registry's primary key.
pub type NodeId = String;

/// One node ("instance") known to the fleet, as projected from the
/// Cloud Adapter's instance payload (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub region: String,
    pub tags: HashSet<String>,
    pub private_address: Option<SocketAddr>,
    pub public_address: Option<SocketAddr>,
}

impl Node {
    /// A node with neither a private nor a public address is unreachable
    /// and cannot be seeded into the gossip engine.
    pub fn reachable_endpoint(&self) -> Option<SocketAddr> {
        self.private_address.or(self.public_address)
    }
}

/// A gossip engine's role for one peer (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Citizen,
    Leader,
}

/// Whether a peer is still being heard from, or has timed out (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Alive,
    Removed,
}

/// Immutable-after-registration group definition (§3).
#[derive(Debug, Clone)]
pub struct GroupDefinition {
    pub match_tags: HashSet<String>,
    pub desired_size: u32,
    pub provisioning_template: ProvisioningTemplate,
    pub floating_address: Option<String>,
}

/// Opaque payload carried to the Cloud Adapter's `create` operation (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningTemplate {
    #[serde(rename = "name")]
    pub name_base: String,
    pub region: String,
    pub size: String,
    pub image: String,
    #[serde(default)]
    pub ssh_keys: Vec<String>,
    #[serde(default)]
    pub backups: bool,
    #[serde(default)]
    pub ipv6: bool,
    #[serde(default)]
    pub private_networking: bool,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
}

/// Construction-time configuration for one agent (§6).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API key / credential handed to the Cloud Adapter.
    pub key: String,
    /// The distinguished fleet tag every managed node carries.
    pub fleet_tag: String,
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            fleet_tag: "fleet".to_string(),
            timeout_ms: 60_000,
            interval_ms: 10_000,
            port: 12345,
        }
    }
}

/// A group registration request, as handed to `Agent::register_group` (§6).
///
/// `Deserialize` lets the `cmd` binary load a list of these straight out of
/// a group-registration JSON file (§0 AMBIENT), using the same field names
/// the spec's configuration section documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    pub match_tags: HashSet<String>,
    #[serde(default = "default_desired_size")]
    pub desired_size: u32,
    #[serde(default)]
    pub floating_address: Option<String>,
    pub provisioning_template: ProvisioningTemplate,
}

fn default_desired_size() -> u32 {
    1
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            match_tags: HashSet::new(),
            desired_size: 1,
            floating_address: None,
            provisioning_template: ProvisioningTemplate {
                name_base: "node".to_string(),
                region: String::new(),
                size: String::new(),
                image: String::new(),
                ssh_keys: Vec::new(),
                backups: false,
                ipv6: false,
                private_networking: false,
                user_data: None,
                monitoring: false,
                volumes: Vec::new(),
                tags: HashSet::new(),
            },
        }
    }
}

/// Returns true iff `tags` is a subset of `match_tags ∪ {fleet_tag}` (§4.4, §8 I-5).
///
/// This is deliberately asymmetric: a node carrying a tag the group doesn't
/// list is not a member, even if it carries every tag the group does list.
pub fn is_group_member(tags: &HashSet<String>, match_tags: &HashSet<String>, fleet_tag: &str) -> bool {
    tags.iter().all(|t| match_tags.contains(t) || t == fleet_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extra_tag_excludes_membership() {
        let tags = set(&["ENV:T", "TYPE:special", "fleet"]);
        let match_tags = set(&["ENV:T"]);
        assert!(!is_group_member(&tags, &match_tags, "fleet"));
    }

    #[test]
    fn exact_match_is_member() {
        let tags = set(&["ENV:T", "fleet"]);
        let match_tags = set(&["ENV:T"]);
        assert!(is_group_member(&tags, &match_tags, "fleet"));
    }

    #[test]
    fn empty_match_tags_matches_only_fleet_tag() {
        let tags = set(&["fleet"]);
        assert!(is_group_member(&tags, &HashSet::new(), "fleet"));

        let tags2 = set(&["fleet", "extra"]);
        assert!(!is_group_member(&tags2, &HashSet::new(), "fleet"));
    }
}
