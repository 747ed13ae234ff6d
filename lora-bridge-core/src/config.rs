use crate::{BridgeError, BridgeResult};
use serde::Deserialize;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub chirpstack: ChirpStackConfig,
    #[serde(default)]
    pub uplink: UplinkConfig,
}

/// Connection and provisioning settings for the remote network server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChirpStackConfig {
    /// API endpoint, e.g. `http://localhost:8080`.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Session key used for all four keys when activating a device (ABP).
    #[serde(default)]
    pub activate_key: String,
    /// Defaults applied when creating remote device-profiles.
    #[serde(default)]
    pub profile: ProfileDefaults,
}

impl Default for ChirpStackConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            activate_key: String::new(),
            profile: ProfileDefaults::default(),
        }
    }
}

impl ChirpStackConfig {
    /// Reject blank required settings before any connection attempt.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.host.is_empty() {
            return Err(BridgeError::Configuration(
                "chirpstack.host configuration setting can not be blank".into(),
            ));
        }
        if self.username.is_empty() {
            return Err(BridgeError::Configuration(
                "chirpstack.username configuration setting can not be blank".into(),
            ));
        }
        if self.password.is_empty() {
            return Err(BridgeError::Configuration(
                "chirpstack.password configuration setting can not be blank".into(),
            ));
        }
        if self.activate_key.is_empty() {
            return Err(BridgeError::Configuration(
                "chirpstack.activate_key configuration setting can not be blank".into(),
            ));
        }
        Ok(())
    }
}

/// Remote device-profile creation defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileDefaults {
    #[serde(default = "ProfileDefaults::default_region")]
    pub region: String,
    #[serde(default = "ProfileDefaults::default_mac_version")]
    pub mac_version: String,
    #[serde(default = "ProfileDefaults::default_adr_algorithm_id")]
    pub adr_algorithm_id: String,
    /// Expected uplink interval in seconds.
    #[serde(default = "ProfileDefaults::default_uplink_interval")]
    pub uplink_interval: u32,
}

impl ProfileDefaults {
    fn default_region() -> String {
        "cn470".into()
    }
    fn default_mac_version() -> String {
        "1.0.2".into()
    }
    fn default_adr_algorithm_id() -> String {
        "default".into()
    }
    fn default_uplink_interval() -> u32 {
        600
    }
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            region: Self::default_region(),
            mac_version: Self::default_mac_version(),
            adr_algorithm_id: Self::default_adr_algorithm_id(),
            uplink_interval: Self::default_uplink_interval(),
        }
    }
}

/// Uplink sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UplinkConfig {
    /// Bounded capacity of the shared uplink channel. A slow consumer
    /// throttles the session drain loops rather than dropping data.
    #[serde(default = "UplinkConfig::default_queue_capacity")]
    pub queue_capacity: usize,
}

impl UplinkConfig {
    fn default_queue_capacity() -> usize {
        64
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Self::default_queue_capacity(),
        }
    }
}
