use std::collections::HashMap;

use crate::cloud::{AddressKind, Instance};
use crate::types::{is_group_member, GroupDefinition, Node, NodeId};

/// Canonical in-memory map of known nodes, indexed by provider instance id
/// (§2, §4.4). Group membership is always computed fresh from here — no
/// shadow list is kept (§3 invariant 3).
#[derive(Debug, Default)]
pub struct ServerRegistry {
    nodes: HashMap<NodeId, Node>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self { nodes: HashMap::new() }
    }

    /// Projects a provider instance into a Node record, picking the first
    /// address of each kind (§4.4). Overwrites any existing entry for the
    /// same id with the fresher data.
    pub fn upsert(&mut self, instance: Instance) -> &Node {
        let private_address = first_address(&instance.addresses, AddressKind::Private);
        let public_address = first_address(&instance.addresses, AddressKind::Public);
        let id = instance.id.clone();
        let node = Node {
            id: id.clone(),
            name: instance.name,
            region: instance.region.slug,
            tags: instance.tags,
            private_address,
            public_address,
        };
        self.nodes.insert(id.clone(), node);
        self.nodes.get(&id).unwrap()
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.nodes.remove(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Every node whose tag set belongs to `group` under the §4.4 predicate.
    /// Deterministically ordered by id, so callers that need a stable
    /// "first K members" selection (§4.5 step 4) get one for free.
    pub fn by_group(&self, group: &GroupDefinition, fleet_tag: &str) -> Vec<&Node> {
        let mut members: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| is_group_member(&n.tags, &group.match_tags, fleet_tag))
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }
}

fn first_address(addresses: &[crate::cloud::AddressRecord], kind: AddressKind) -> Option<std::net::SocketAddr> {
    addresses
        .iter()
        .find(|a| a.kind == kind)
        .and_then(|a| a.address.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{AddressRecord, RegionRef};
    use std::collections::HashSet;

    fn instance(id: &str, tags: &[&str]) -> Instance {
        Instance {
            id: id.to_string(),
            name: id.to_string(),
            region: RegionRef { slug: "nyc1".to_string() },
            tags: tags.iter().map(|t| t.to_string()).collect(),
            addresses: vec![AddressRecord {
                kind: AddressKind::Private,
                address: "10.0.0.1:12345".to_string(),
            }],
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let mut registry = ServerRegistry::new();
        registry.upsert(instance("a", &["fleet"]));
        assert!(registry.contains(&"a".to_string()));
        assert_eq!(registry.get(&"a".to_string()).unwrap().id, "a");
    }

    #[test]
    fn by_group_respects_asymmetric_predicate() {
        let mut registry = ServerRegistry::new();
        registry.upsert(instance("a", &["ENV:T", "fleet"]));
        registry.upsert(instance("x", &["ENV:T", "TYPE:special", "fleet"]));

        let group = GroupDefinition {
            match_tags: HashSet::from(["ENV:T".to_string()]),
            desired_size: 2,
            provisioning_template: crate::types::GroupConfig::default().provisioning_template,
            floating_address: None,
        };

        let members = registry.by_group(&group, "fleet");
        let ids: HashSet<&str> = members.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["a"]));
    }

    #[test]
    fn remove_drops_the_node() {
        let mut registry = ServerRegistry::new();
        registry.upsert(instance("a", &["fleet"]));
        registry.remove(&"a".to_string());
        assert!(!registry.contains(&"a".to_string()));
    }
}
