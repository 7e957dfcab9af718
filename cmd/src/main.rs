mod commands;
mod env_var;

use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;

use cloud_adapter::HttpCloudAdapter;
use fleet_agent::identity::HttpMetadataIdentity;
use fleet_agent::types::{AgentConfig, GroupConfig};
use fleet_agent::Agent;

use commands::Cmd;
use env_var::EnvVars;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _log_guards = telemetry::init_logger(telemetry::LoggerConfig::default());

    match telemetry::init_telemetry() {
        Ok(addr) => tracing::info!(%addr, "prometheus exporter listening"),
        Err(e) => tracing::warn!(error = %e, "prometheus exporter failed to start, continuing without metrics"),
    }

    let cmd = Cmd::parse();
    let env_vars = EnvVars::load();
    if env_vars.FLEET_API_TOKEN.is_empty() {
        return Err(eyre!("FLEET_API_TOKEN is not set; the agent cannot authenticate to the Cloud Adapter"));
    }

    let groups_raw = std::fs::read_to_string(&cmd.groups)
        .map_err(|e| eyre!("failed to read groups file {}: {}", cmd.groups.display(), e))?;
    let groups: Vec<GroupConfig> = serde_json::from_str(&groups_raw)
        .map_err(|e| eyre!("failed to parse groups file {}: {}", cmd.groups.display(), e))?;

    let cloud = Arc::new(match &cmd.cloud_base_url {
        Some(base) => HttpCloudAdapter::with_base_url(env_vars.FLEET_API_TOKEN.clone(), base.clone(), cmd.port),
        None => HttpCloudAdapter::new(env_vars.FLEET_API_TOKEN.clone(), cmd.port),
    });

    let identity = match &cmd.metadata_url {
        Some(url) => HttpMetadataIdentity::new(url.clone()),
        None => HttpMetadataIdentity::default(),
    };

    let config = AgentConfig {
        key: env_vars.FLEET_API_TOKEN.clone(),
        fleet_tag: cmd.tag,
        timeout_ms: cmd.timeout_ms,
        interval_ms: cmd.interval_ms,
        port: cmd.port,
    };

    let agent = Agent::bootstrap(config, cloud, &identity).await?;
    tracing::info!(id = %agent.local_id(), "agent bootstrapped from cloud listing");

    for group in groups {
        let index = agent.register_group(group).await;
        tracing::info!(index, "group registered");
    }

    agent.run().await?;
    Ok(())
}
