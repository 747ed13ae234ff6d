use crate::{
    types::{ProtocolProperties, LORA_CODEC},
    BridgeError, BridgeResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Framework-side device record.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub name: String,
    pub profile_name: String,
    #[serde(default)]
    pub protocols: ProtocolProperties,
}

/// Framework-side device profile.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    #[serde(default)]
    pub device_resources: Vec<DeviceResource>,
}

/// One declared data resource on a profile. The `optional` map may
/// carry the codec marker whose value is the remote codec script.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceResource {
    pub name: String,
    #[serde(default)]
    pub optional: HashMap<String, Value>,
}

impl DeviceResource {
    /// Codec script embedded in the resource's optional properties.
    pub fn codec_script(&self) -> Option<String> {
        self.optional.get(LORA_CODEC).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Read-only view of the framework's device/profile registry.
#[async_trait]
pub trait DeviceMetadataProvider: Send + Sync {
    async fn get_device_by_name(&self, name: &str) -> BridgeResult<Device>;
    async fn get_profile_by_name(&self, name: &str) -> BridgeResult<DeviceProfile>;
    async fn device_resource(&self, device_name: &str, source_name: &str)
        -> Option<DeviceResource>;
}

/// Resolve the single declared data resource of `device`'s profile.
///
/// Hard precondition for opening a session: the profile must declare
/// exactly one resource and that resource must carry the codec marker.
pub async fn resolve_uplink_resource(
    metadata: &dyn DeviceMetadataProvider,
    device: &Device,
) -> BridgeResult<DeviceResource> {
    let profile = metadata.get_profile_by_name(&device.profile_name).await?;
    if profile.device_resources.len() != 1 {
        return Err(BridgeError::ResourceNotFound(format!(
            "profile '{}' declares {} data resources, expected exactly 1",
            profile.name,
            profile.device_resources.len()
        )));
    }
    let declared = &profile.device_resources[0];
    if declared.codec_script().is_none() {
        return Err(BridgeError::ResourceNotFound(format!(
            "resource '{}' of profile '{}' carries no '{LORA_CODEC}' marker",
            declared.name, profile.name
        )));
    }
    metadata
        .device_resource(&device.name, &declared.name)
        .await
        .ok_or_else(|| {
            BridgeError::ResourceNotFound(format!(
                "resource '{}' not found for device '{}'",
                declared.name, device.name
            ))
        })
}

/// Static provider backed by in-memory maps. Used by the service
/// binary for file-based inventories and by tests.
#[derive(Debug, Default)]
pub struct InMemoryMetadataProvider {
    devices: HashMap<String, Device>,
    profiles: HashMap<String, DeviceProfile>,
}

impl InMemoryMetadataProvider {
    pub fn new(devices: Vec<Device>, profiles: Vec<DeviceProfile>) -> Arc<Self> {
        Arc::new(Self {
            devices: devices.into_iter().map(|d| (d.name.clone(), d)).collect(),
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
        })
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }
}

#[async_trait]
impl DeviceMetadataProvider for InMemoryMetadataProvider {
    async fn get_device_by_name(&self, name: &str) -> BridgeResult<Device> {
        self.devices
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("device '{name}'")))
    }

    async fn get_profile_by_name(&self, name: &str) -> BridgeResult<DeviceProfile> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("profile '{name}'")))
    }

    async fn device_resource(
        &self,
        device_name: &str,
        source_name: &str,
    ) -> Option<DeviceResource> {
        let device = self.devices.get(device_name)?;
        let profile = self.profiles.get(&device.profile_name)?;
        profile
            .device_resources
            .iter()
            .find(|r| r.name == source_name)
            .cloned()
    }
}
