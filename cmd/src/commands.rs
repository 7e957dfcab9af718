use std::path::PathBuf;

use clap::Parser;

/// CLI surface for one agent process (§6 Configuration: `{key, tag,
/// timeout=60000 ms, interval=10000 ms, port=12345}` plus group
/// registration). The API key itself is read from the environment
/// (`FLEET_API_TOKEN`), not accepted as a flag.
#[derive(Parser, Debug)]
#[command(name = "fleet-sentinel", about = "Decentralized self-healing controller for a fleet of cloud VMs")]
pub struct Cmd {
    /// The distinguished fleet tag every managed node carries.
    #[arg(long, default_value = "fleet")]
    pub tag: String,

    /// Liveness timeout (ms) before a silent peer is marked removed.
    #[arg(long, default_value_t = 60_000)]
    pub timeout_ms: u64,

    /// Gossip heartbeat interval (ms).
    #[arg(long, default_value_t = 10_000)]
    pub interval_ms: u64,

    /// Gossip bind/peer port.
    #[arg(long, default_value_t = 12345)]
    pub port: u16,

    /// Path to a JSON file holding an array of group registrations
    /// (`matchTags`, `desiredSize`, `floatingAddress`, `provisioningTemplate`).
    #[arg(long)]
    pub groups: PathBuf,

    /// Overrides the link-local metadata endpoint this agent queries for
    /// its own instance id. Mainly useful for dry runs off-provider.
    #[arg(long)]
    pub metadata_url: Option<String>,

    /// Overrides the Cloud Adapter's API base URL, e.g. to point at a
    /// local mock server in a dry run.
    #[arg(long)]
    pub cloud_base_url: Option<String>,
}
