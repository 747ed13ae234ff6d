use lora_bridge_core::{BridgeError, BridgeResult, Device, DeviceProfile, ServiceConfig};
use serde::Deserialize;
use std::path::Path;

/// Service settings as loaded from the configuration file plus
/// `LORA_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(flatten)]
    pub service: ServiceConfig,
    /// TOML file declaring the managed device and profile inventory.
    #[serde(default = "AppSettings::default_devices_file")]
    pub devices_file: String,
    #[serde(default = "AppSettings::default_log_level")]
    pub log_level: String,
}

impl AppSettings {
    fn default_devices_file() -> String {
        "devices.toml".into()
    }

    fn default_log_level() -> String {
        "info".into()
    }

    pub fn load(path: &Path) -> BridgeResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("LORA").separator("__"))
            .build()
            .map_err(|e| BridgeError::Configuration(format!("failed to load settings: {e}")))?;
        settings
            .try_deserialize()
            .map_err(|e| BridgeError::Configuration(format!("invalid settings: {e}")))
    }
}

/// Static device/profile inventory backing the metadata provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub profiles: Vec<DeviceProfile>,
}

impl Inventory {
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let inventory = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| BridgeError::Configuration(format!("failed to load inventory: {e}")))?;
        inventory
            .try_deserialize()
            .map_err(|e| BridgeError::Configuration(format!("invalid inventory: {e}")))
    }
}
