use crate::{
    client::NetworkServerClient,
    metadata::{resolve_uplink_resource, Device, DeviceMetadataProvider},
    session::SessionManager,
    types::{LoraProtocolParams, ProtocolProperties, LORA_PROTOCOL},
    BridgeError, BridgeResult,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle orchestrator: translates framework add/update/remove
/// device events into remote CRUD calls plus session-manager
/// operations, in that order.
///
/// Side effects are best-effort, not transactional: a remote-call
/// failure aborts the remaining steps of the operation without
/// rolling back already-applied remote changes (an orphaned remote
/// profile is possible and accepted).
pub struct LoraDriver {
    client: Arc<dyn NetworkServerClient>,
    metadata: Arc<dyn DeviceMetadataProvider>,
    sessions: Arc<SessionManager>,
    activate_key: String,
}

impl LoraDriver {
    pub fn new(
        client: Arc<dyn NetworkServerClient>,
        metadata: Arc<dyn DeviceMetadataProvider>,
        sessions: Arc<SessionManager>,
        activate_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            metadata,
            sessions,
            activate_key: activate_key.into(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Rebuild the session set from the framework's current device
    /// list. Called once at startup.
    pub async fn start(&self, devices: &[Device]) {
        self.sessions.rebuild(devices).await;
    }

    pub async fn add_device(
        &self,
        device_name: &str,
        protocols: &ProtocolProperties,
    ) -> BridgeResult<()> {
        info!(device = device_name, "AddDevice");
        let params = LoraProtocolParams::from_protocols(protocols)?;
        let device = self.metadata.get_device_by_name(device_name).await?;
        let profile = self
            .metadata
            .get_profile_by_name(&device.profile_name)
            .await?;

        if params.gateway {
            return self.client.create_gateway(&params.eui, &device.name).await;
        }

        // The codec script travels with the profile's single declared
        // resource; without it the remote profile cannot decode uplinks.
        let resource = resolve_uplink_resource(self.metadata.as_ref(), &device).await?;
        let codec = resource.codec_script().ok_or_else(|| {
            BridgeError::MissingCodec(format!(
                "resource '{}' of profile '{}' has no codec script",
                resource.name, profile.name
            ))
        })?;

        let profile_id = self.client.ensure_profile(&profile.name, &codec).await?;
        self.client
            .create_device(&params.eui, &device.name, &profile_id)
            .await?;
        self.client
            .activate_device(&params.eui, &self.activate_key)
            .await?;
        self.sessions.start(&device, &params.eui).await
    }

    pub async fn update_device(
        &self,
        device_name: &str,
        protocols: &ProtocolProperties,
    ) -> BridgeResult<()> {
        info!(device = device_name, "UpdateDevice");
        let params = LoraProtocolParams::from_protocols(protocols)?;
        let device = self.metadata.get_device_by_name(device_name).await?;

        if params.gateway {
            return self.client.update_gateway(&params.eui, &device.name).await;
        }

        self.client
            .update_device(&params.eui, &device.name)
            .await?;
        // The EUI may have changed; the old session is stale either way.
        self.sessions.replace(&device, &params.eui).await
    }

    pub async fn remove_device(
        &self,
        device_name: &str,
        protocols: &ProtocolProperties,
    ) -> BridgeResult<()> {
        info!(device = device_name, "RemoveDevice");
        let params = LoraProtocolParams::from_protocols(protocols)?;

        if params.gateway {
            return self.client.delete_gateway(&params.eui).await;
        }

        // Remote deletion first; a listener left running against a
        // deleted device self-resolves when the stream closes, but is
        // avoided where possible.
        self.client.delete_device(&params.eui).await?;
        if let Err(e) = self.sessions.cancel(device_name).await {
            warn!(device = device_name, error = %e, "Failed to cancel session after device removal");
        }
        Ok(())
    }

    /// Framework validation hook: devices carrying a `Lora` protocol
    /// section must parse into the typed record.
    pub fn validate_device(&self, device: &Device) -> BridgeResult<()> {
        if device.protocols.contains_key(LORA_PROTOCOL) {
            LoraProtocolParams::from_protocols(&device.protocols)
                .map_err(|e| BridgeError::Configuration(format!("invalid protocol properties: {e}")))?;
        }
        Ok(())
    }
}
