//! The membership-and-healing control loop: peer discovery, gossip-based
//! liveness and leader election, the pending-removal staging protocol, and
//! the group-balancing state machine that turns membership deltas into
//! create/destroy actions against an external Cloud Adapter.

pub mod agent;
pub mod cloud;
pub mod error;
pub mod floating_address;
pub mod gossip;
pub mod group_controller;
pub mod identity;
pub mod naming;
pub mod pending_removal;
pub mod registry;
pub mod transport;
pub mod types;

pub use agent::Agent;
pub use cloud::{CloudAdapter, CloudError};
pub use error::AgentError;
pub use gossip::{GossipConfig, GossipEngine, GossipEvent, GossipHandle};
pub use group_controller::GroupController;
pub use identity::IdentityProvider;
pub use registry::ServerRegistry;
pub use types::{AgentConfig, GroupConfig, GroupDefinition, Node, NodeId, ProvisioningTemplate, Role};
