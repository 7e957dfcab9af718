use lazy_static::lazy_static;
use prometheus_exporter::prometheus::{
    register_int_counter,
    register_int_gauge,
    IntCounter,
    IntGauge,
};

lazy_static! {
    /// Peers ever added to any gossip engine's table.
    pub static ref PEERS_ADDED_TOTAL: IntCounter = register_int_counter!(
        "fleet_peers_added_total",
        "Total number of peers added to the peer table"
    ).unwrap();

    /// Peers marked removed after exceeding the liveness timeout.
    pub static ref PEERS_REMOVED_TOTAL: IntCounter = register_int_counter!(
        "fleet_peers_removed_total",
        "Total number of peers marked removed after a liveness timeout"
    ).unwrap();

    /// Elections this agent has won.
    pub static ref ELECTIONS_WON_TOTAL: IntCounter = register_int_counter!(
        "fleet_elections_won_total",
        "Total number of elections won by the local agent"
    ).unwrap();

    /// create() calls issued to the Cloud Adapter.
    pub static ref CREATES_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "fleet_creates_issued_total",
        "Total number of create() calls issued while balancing groups"
    ).unwrap();

    /// destroy() calls issued to the Cloud Adapter.
    pub static ref DESTROYS_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "fleet_destroys_issued_total",
        "Total number of destroy() calls issued"
    ).unwrap();

    /// Number of events currently sitting in the pending-removal buffer.
    pub static ref PENDING_REMOVALS: IntGauge = register_int_gauge!(
        "fleet_pending_removals",
        "Removal events buffered while awaiting leader election"
    ).unwrap();

    /// 1 while the local agent holds fleet leadership, 0 otherwise.
    pub static ref IS_LEADER: IntGauge = register_int_gauge!(
        "fleet_is_leader",
        "Whether the local agent currently holds fleet leadership"
    ).unwrap();
}

/// Starts the Prometheus exporter HTTP server, reading `PROMETHEUS_PORT` (default 9090).
pub fn init_telemetry() -> color_eyre::Result<String> {
    dotenv::dotenv().ok();
    let port = std::env::var("PROMETHEUS_PORT")
        .unwrap_or("9090".to_string());

    let url = format!("0.0.0.0:{}", port);
    prometheus_exporter::start(url.parse()?)?;
    Ok(url)
}
