use std::fmt;

/// Errors surfaced from `fleet-agent`'s own startup path, distinct from
/// `CloudError` (§7: a Cloud Adapter failure is logged and reconverges;
/// these are fatal to the agent process).
#[derive(Debug)]
pub enum AgentError {
    /// The metadata source could not resolve the local instance id (§7:
    /// fatal, the agent cannot know its own identity).
    IdentityUnavailable(String),
    /// The Cloud Adapter's initial `list` call failed during bootstrap.
    /// Distinct from `IdentityUnavailable`: the agent knows who it is, but
    /// cannot learn who else is in the fleet (§7).
    BootstrapListFailed(String),
    /// The metadata-reported self id is absent from the initial IaaS
    /// listing (§9 Open Questions: undefined in the source, this spec
    /// treats it as fatal — the agent cannot be a member of the fleet
    /// it is trying to manage).
    SelfNotInFleet(String),
    /// The local bind address could not be parsed or bound.
    Bind(std::io::Error),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::IdentityUnavailable(msg) => write!(f, "could not resolve local identity: {}", msg),
            AgentError::BootstrapListFailed(msg) => {
                write!(f, "could not list the initial fleet from the cloud adapter: {}", msg)
            }
            AgentError::SelfNotInFleet(id) => {
                write!(f, "self id {} is not present in the initial fleet listing", id)
            }
            AgentError::Bind(e) => write!(f, "failed to bind gossip transport: {}", e),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::Bind(e)
    }
}
