use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use fleet_agent::cloud::{AddressKind, AddressRecord, Instance, RegionRef};
use fleet_agent::types::ProvisioningTemplate;

/// The provider's droplet payload shape, mapped onto the core's `Instance`
/// (§4.3, §6). Field names follow the modeled provider's JSON-over-HTTPS API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DropletWire {
    pub id: u64,
    pub name: String,
    pub region: RegionWire,
    #[serde(default)]
    pub tags: Vec<String>,
    pub networks: NetworksWire,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RegionWire {
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NetworksWire {
    #[serde(default)]
    pub v4: Vec<NetworkAddressWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NetworkAddressWire {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl DropletWire {
    /// Projects the wire shape onto the core's `Instance`, pairing each
    /// address with the agent's configured gossip port (§6: "default port
    /// 12345, configurable per agent") rather than a literal default —
    /// the provider's address records carry no port of their own.
    pub(crate) fn into_instance(self, gossip_port: u16) -> Instance {
        let addresses = self
            .networks
            .v4
            .into_iter()
            .map(|n| AddressRecord {
                kind: if n.kind == "public" { AddressKind::Public } else { AddressKind::Private },
                address: format!("{}:{}", n.ip_address, gossip_port),
            })
            .collect();
        Instance {
            id: self.id.to_string(),
            name: self.name,
            region: RegionRef { slug: self.region.slug },
            tags: self.tags.into_iter().collect::<HashSet<_>>(),
            addresses,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DropletEnvelope {
    pub droplet: DropletWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DropletsListEnvelope {
    pub droplets: Vec<DropletWire>,
    #[serde(default)]
    pub links: LinksWire,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LinksWire {
    #[serde(default)]
    pub pages: Option<PagesWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PagesWire {
    pub next: Option<String>,
}

/// The `create` request body (§6): `{name, region, size, image, sshKeys,
/// backups, ipv6, privateNetworking, userData, monitoring, volumes, tags}`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateDropletRequest {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    #[serde(rename = "sshKeys")]
    pub ssh_keys: Vec<String>,
    pub backups: bool,
    pub ipv6: bool,
    #[serde(rename = "privateNetworking")]
    pub private_networking: bool,
    #[serde(rename = "userData", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    pub monitoring: bool,
    pub volumes: Vec<String>,
    pub tags: Vec<String>,
}

impl CreateDropletRequest {
    pub fn from_template(template: &ProvisioningTemplate) -> Self {
        Self {
            name: template.name_base.clone(),
            region: template.region.clone(),
            size: template.size.clone(),
            image: template.image.clone(),
            ssh_keys: template.ssh_keys.clone(),
            backups: template.backups,
            ipv6: template.ipv6,
            private_networking: template.private_networking,
            user_data: template.user_data.clone(),
            monitoring: template.monitoring,
            volumes: template.volumes.clone(),
            tags: template.tags.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FloatingAddressActionRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub droplet_id: u64,
}
