//! Zenoh bridge for emonhub-style interfacers.
//!
//! Runs one poll loop per configured interfacer and publishes node payloads
//! to Zenoh.

use std::sync::Arc;

use anyhow::{Context, Result};
use emonlink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, Protocol};
use tracing::info;
use zenoh_bridge_interfacer::config::InterfacerBridgeConfig;
use zenoh_bridge_interfacer::poller::PollCycle;
use zenoh_bridge_interfacer::transport::{HiokiTransport, ModbusTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("interfacer.json5");

    let config = InterfacerBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut runner = BridgeRunner::new("interfacer", config, &args)
        .await
        .context("Failed to start bridge")?;

    let config = runner.config().clone();
    let nodes = Arc::new(config.nodes.clone());
    let retry_cycles = config.hub.config_retry_cycles;

    for interfacer in &config.hub.interfacers {
        let publisher = runner.publisher();

        info!(
            interfacer = %interfacer.name,
            protocol = %interfacer.protocol,
            endpoint = %interfacer.connection.endpoint(interfacer.protocol),
            "Starting interfacer"
        );

        match interfacer.protocol {
            Protocol::Modbus => {
                let transport = ModbusTransport::from_config(interfacer)
                    .with_context(|| format!("Interfacer '{}'", interfacer.name))?;
                let cycle =
                    PollCycle::from_config(interfacer, transport, nodes.clone(), retry_cycles);
                runner.spawn(interfacer.name.clone(), cycle.run(publisher));
            }
            Protocol::Hioki => {
                let transport = HiokiTransport::from_config(interfacer)
                    .with_context(|| format!("Interfacer '{}'", interfacer.name))?;
                let cycle =
                    PollCycle::from_config(interfacer, transport, nodes.clone(), retry_cycles);
                runner.spawn(interfacer.name.clone(), cycle.run(publisher));
            }
        }
    }

    let metadata = serde_json::json!({
        "interfacers": config
            .hub
            .interfacers
            .iter()
            .map(|i| serde_json::json!({
                "name": i.name,
                "protocol": i.protocol,
                "nodes": i.node_ids(),
                "channels": i.channels,
            }))
            .collect::<Vec<_>>(),
    });

    runner.run_with_metadata(Some(metadata)).await
}
