//! Zenoh bridge for Haas CNC controllers.
//!
//! This bridge polls Haas controllers (Ethernet or RS-232) and publishes
//! machine state to Zenoh.

use anyhow::{Context, Result};
use clap::Parser;
use cncsight_common::{Adapter, KeyExprBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zenoh_bridge_haas::config::{ConnectionConfig, DeviceConfig, HaasBridgeConfig};
use zenoh_bridge_haas::processor::HaasProcessor;
use zenoh_bridge_haas::publisher::{BridgeStatus, ZenohPublisher};
use zenoh_bridge_haas::scheduler::{Scheduler, SchedulerHandle};
use zenoh_bridge_haas::sink::ChannelSink;
use zenoh_bridge_haas::transport::{SerialTransport, TcpTransport};

/// Zenoh bridge for Haas CNC controllers.
#[derive(Parser, Debug)]
#[command(name = "zenoh-bridge-haas")]
#[command(about = "Polls Haas CNC controllers and publishes to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "haas.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = HaasBridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = config
        .logging
        .clone()
        .with_level_override(args.log_level.clone());
    cncsight_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting zenoh-bridge-haas");
    info!("Loaded configuration from {:?}", args.config);

    // Connect to Zenoh
    info!("Connecting to Zenoh...");
    let session = cncsight_common::connect(&config.zenoh)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Zenoh: {}", e))?;
    let session = Arc::new(session);
    info!("Connected to Zenoh");

    let keys = KeyExprBuilder::with_prefix(&config.haas.key_prefix);
    let (sink, rx) = ChannelSink::new(config.haas.queue_capacity, Adapter::Haas);

    let publisher = ZenohPublisher::new(session.clone(), keys.clone(), config.serialization);
    let status_publisher =
        ZenohPublisher::new(session.clone(), keys.clone(), config.serialization);
    let publisher_task = tokio::spawn(publisher.run(rx));

    // Start one scheduler per device
    let handles: Vec<SchedulerHandle> = config
        .haas
        .devices
        .iter()
        .map(|device| start_device(device, sink.clone()))
        .collect();

    // Only the schedulers hold senders from here on.
    drop(sink);

    info!(
        "Haas bridge running with {} device(s)",
        config.haas.devices.len()
    );

    // Publish bridge status
    let devices = config
        .haas
        .devices
        .iter()
        .map(|d| d.device_key.clone())
        .collect();
    status_publisher
        .publish_status(&BridgeStatus::running(devices))
        .await;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    for handle in handles {
        handle.stop().await;
    }

    // All senders are gone once the schedulers stop; the publisher drains
    // what is left and exits.
    if let Err(e) = publisher_task.await {
        tracing::error!("Publisher task failed: {}", e);
    }

    // Publish offline status
    status_publisher
        .publish_status(&BridgeStatus::offline())
        .await;

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close Zenoh session: {}", e))?;
    info!("Haas bridge stopped");

    Ok(())
}

/// Build the transport for a device and start its scheduler.
fn start_device(device: &DeviceConfig, sink: ChannelSink) -> SchedulerHandle {
    info!(
        "Starting poller for device '{}' ({})",
        device.device_key,
        device.connection.describe()
    );

    match &device.connection {
        ConnectionConfig::Tcp {
            server,
            port,
            settle_delay_ms,
            connect_timeout_ms,
        } => {
            let transport = TcpTransport::new(server.clone(), *port)
                .with_settle_delay(std::time::Duration::from_millis(*settle_delay_ms))
                .with_connect_timeout(std::time::Duration::from_millis(*connect_timeout_ms));
            schedule(device, transport, sink)
        }
        ConnectionConfig::Serial {
            com_port,
            settle_delay_ms,
        } => {
            let transport = SerialTransport::new(com_port.clone())
                .with_settle_delay(std::time::Duration::from_millis(*settle_delay_ms));
            schedule(device, transport, sink)
        }
    }
}

fn schedule<T>(device: &DeviceConfig, transport: T, sink: ChannelSink) -> SchedulerHandle
where
    T: zenoh_bridge_haas::transport::Transport + 'static,
{
    let processor = HaasProcessor::new(device.device_key.clone(), transport, sink)
        .with_keys(device.keys.clone())
        .with_response_timeout(device.response_timeout());

    Scheduler::new(processor, device.poll_interval()).start()
}
