//! `linkwise serve`: Start the HTTP API server.

use std::path::Path;

use anyhow::anyhow;

use super::load_config;

pub async fn run(
    config_path: &Path,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Linkwise Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {}", config.store.backend);

    linkwise_gateway::start(config)
        .await
        .map_err(|e| anyhow!("Gateway failed: {e}"))
}
