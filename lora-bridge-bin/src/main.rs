mod logger;
mod settings;

use clap::Parser;
use logger::Logger;
use lora_bridge_chirpstack::ChirpStackClient;
use lora_bridge_core::{
    BridgeError, BridgeResult, InMemoryMetadataProvider, LoraDriver, SessionManager,
};
use settings::{AppSettings, Inventory};
use std::{
    env::current_dir,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

const DEFAULT_CONFIG_FILE_NAME: &str = "lora-bridge.toml";

/// LoRa Bridge - ChirpStack device bridge service
///
/// Bridges a static LoRaWAN device inventory onto a ChirpStack
/// network server: provisions devices and gateways, subscribes to
/// per-device event streams and funnels decoded uplinks into one
/// shared reading channel.
#[derive(Parser)]
#[command(name = "lora-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LoRa Bridge", long_about = None)]
struct Cli {
    /// Sets a custom config file with full path
    ///
    /// If not specified, the service will look for 'lora-bridge.toml'
    /// in the current working directory.
    #[arg(short, long, env = "LORA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> BridgeResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(p) => p,
        None => {
            let dir = current_dir().map_err(|e| {
                BridgeError::Configuration(format!("failed to get current directory: {e}"))
            })?;
            dir.join(DEFAULT_CONFIG_FILE_NAME)
        }
    };

    let app = AppSettings::load(&config_path)?;
    let mut logger = Logger::new(&app.log_level)?;
    logger.initialize()?;

    app.service.chirpstack.validate()?;
    let inventory = Inventory::load(Path::new(&app.devices_file))?;
    info!(
        devices = inventory.devices.len(),
        profiles = inventory.profiles.len(),
        "Loaded device inventory"
    );
    let provider = InMemoryMetadataProvider::new(inventory.devices, inventory.profiles);

    let client = Arc::new(ChirpStackClient::connect(&app.service.chirpstack).await?);

    let (uplink_tx, mut uplink_rx) = mpsc::channel(app.service.uplink.queue_capacity);
    let sessions = SessionManager::new(client.clone(), provider.clone(), uplink_tx);
    let driver = LoraDriver::new(
        client,
        provider.clone(),
        sessions.clone(),
        app.service.chirpstack.activate_key.clone(),
    );

    for device in provider.devices() {
        if let Err(e) = driver.validate_device(&device) {
            warn!(device = %device.name, error = %e, "Device failed validation");
        }
    }
    driver.start(&provider.devices()).await;
    info!(sessions = sessions.session_count().await, "Bridge started");

    // Uplink consumer: in this standalone service readings terminate
    // in the log.
    let consumer = tokio::spawn(async move {
        while let Some(reading) = uplink_rx.recv().await {
            info!(
                device = %reading.device_name,
                source = %reading.source_name,
                origin = %reading.origin,
                value = %reading.value,
                "Uplink reading"
            );
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| BridgeError::Configuration(format!("failed to listen for shutdown: {e}")))?;
    info!("Shutdown signal received; cancelling sessions");
    sessions.cancel_all().await;
    consumer.abort();
    info!("Bridge stopped");
    Ok(())
}
