use crate::stream::ChirpStackEventStream;
use async_trait::async_trait;
use chirpstack_api::api::{
    application_service_client::ApplicationServiceClient,
    device_profile_service_client::DeviceProfileServiceClient,
    device_service_client::DeviceServiceClient, gateway_service_client::GatewayServiceClient,
    internal_service_client::InternalServiceClient, tenant_service_client::TenantServiceClient,
    ActivateDeviceRequest, Application, CodecRuntime, CreateApplicationRequest,
    CreateDeviceProfileRequest, CreateDeviceRequest, CreateGatewayRequest, CreateTenantRequest,
    DeleteDeviceProfileRequest, DeleteDeviceRequest, DeleteGatewayRequest, Device,
    DeviceActivation, DeviceProfile, Gateway, GetDeviceRequest, GetGatewayRequest,
    GetRandomDevAddrRequest, ListApplicationsRequest, ListDeviceProfilesRequest,
    ListTenantsRequest, LoginRequest, StreamDeviceEventsRequest, Tenant, UpdateDeviceRequest,
    UpdateGatewayRequest,
};
use chirpstack_api::common::{MacVersion, Region, RegParamsRevision};
use lora_bridge_core::{
    BridgeError, BridgeResult, ChirpStackConfig, EventStream, NetworkServerClient, ProfileDefaults,
};
use tokio_util::sync::CancellationToken;
use tonic::{
    metadata::AsciiMetadataValue,
    transport::{Channel, Endpoint},
    Code, Request, Status,
};
use tracing::{debug, info};

/// Page size for all list calls during lookups.
const PAGE_LIMIT: u32 = 100;

/// Tenant/application names created when the server is empty.
const DEFAULT_TENANT_NAME: &str = "lora-bridge";
const DEFAULT_APPLICATION_NAME: &str = "lora-bridge-app";

/// Gateway stats reporting interval, in seconds.
const GATEWAY_STATS_INTERVAL: u32 = 3000;

/// ChirpStack v4 gRPC client.
///
/// One connected instance is shared across the whole service. All
/// provisioning happens under the tenant and application resolved at
/// connect time.
pub struct ChirpStackClient {
    channel: Channel,
    auth: AsciiMetadataValue,
    tenant_id: String,
    application_id: String,
    defaults: ProfileDefaults,
}

impl ChirpStackClient {
    /// Connect, log in and resolve the tenant/application to provision
    /// under.
    pub async fn connect(config: &ChirpStackConfig) -> BridgeResult<Self> {
        config.validate()?;

        let url = if config.host.contains("://") {
            config.host.clone()
        } else {
            format!("http://{}", config.host)
        };
        let channel = Endpoint::from_shared(url)
            .map_err(|e| BridgeError::Configuration(format!("invalid chirpstack host: {e}")))?
            .connect()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let mut internal = InternalServiceClient::new(channel.clone());
        let login = internal
            .login(LoginRequest {
                email: config.username.clone(),
                password: config.password.clone(),
            })
            .await
            .map_err(remote)?
            .into_inner();
        let auth = AsciiMetadataValue::try_from(format!("Bearer {}", login.jwt))
            .map_err(|e| BridgeError::Configuration(format!("unusable login token: {e}")))?;

        let mut client = Self {
            channel,
            auth,
            tenant_id: String::new(),
            application_id: String::new(),
            defaults: config.profile.clone(),
        };
        client.tenant_id = client.resolve_tenant().await?;
        client.application_id = client.resolve_application().await?;
        info!(
            tenant_id = %client.tenant_id,
            application_id = %client.application_id,
            "Connected to ChirpStack"
        );
        Ok(client)
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request
            .metadata_mut()
            .insert("authorization", self.auth.clone());
        request
    }

    /// First existing tenant wins; an empty server gets one created.
    async fn resolve_tenant(&self) -> BridgeResult<String> {
        let mut tenants = TenantServiceClient::new(self.channel.clone());
        let listed = tenants
            .list(self.request(ListTenantsRequest {
                limit: PAGE_LIMIT,
                ..Default::default()
            }))
            .await
            .map_err(remote)?
            .into_inner();
        if let Some(tenant) = listed.result.first() {
            return Ok(tenant.id.clone());
        }

        let created = tenants
            .create(self.request(CreateTenantRequest {
                tenant: Some(Tenant {
                    name: DEFAULT_TENANT_NAME.to_string(),
                    can_have_gateways: true,
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?
            .into_inner();
        info!(tenant_id = %created.id, "Created tenant");
        Ok(created.id)
    }

    async fn resolve_application(&self) -> BridgeResult<String> {
        let mut applications = ApplicationServiceClient::new(self.channel.clone());
        let listed = applications
            .list(self.request(ListApplicationsRequest {
                limit: PAGE_LIMIT,
                tenant_id: self.tenant_id.clone(),
                ..Default::default()
            }))
            .await
            .map_err(remote)?
            .into_inner();
        if let Some(application) = listed.result.first() {
            return Ok(application.id.clone());
        }

        let created = applications
            .create(self.request(CreateApplicationRequest {
                application: Some(Application {
                    name: DEFAULT_APPLICATION_NAME.to_string(),
                    tenant_id: self.tenant_id.clone(),
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?
            .into_inner();
        info!(application_id = %created.id, "Created application");
        Ok(created.id)
    }

    fn region(&self) -> Region {
        match self.defaults.region.to_ascii_lowercase().as_str() {
            "eu868" => Region::Eu868,
            "us915" => Region::Us915,
            "cn779" => Region::Cn779,
            "eu433" => Region::Eu433,
            "au915" => Region::Au915,
            "as923" => Region::As923,
            "kr920" => Region::Kr920,
            "in865" => Region::In865,
            "ru864" => Region::Ru864,
            _ => Region::Cn470,
        }
    }

    fn mac_version(&self) -> MacVersion {
        match self.defaults.mac_version.as_str() {
            "1.0.0" => MacVersion::Lorawan100,
            "1.0.1" => MacVersion::Lorawan101,
            "1.0.3" => MacVersion::Lorawan103,
            "1.0.4" => MacVersion::Lorawan104,
            "1.1.0" => MacVersion::Lorawan110,
            _ => MacVersion::Lorawan102,
        }
    }
}

fn remote(status: Status) -> BridgeError {
    BridgeError::RemoteCall(status.to_string())
}

#[async_trait]
impl NetworkServerClient for ChirpStackClient {
    /// Reuse an existing profile of the same name, otherwise create
    /// one carrying the codec script and the configured radio defaults.
    async fn ensure_profile(&self, name: &str, codec: &str) -> BridgeResult<String> {
        let mut profiles = DeviceProfileServiceClient::new(self.channel.clone());
        let listed = profiles
            .list(self.request(ListDeviceProfilesRequest {
                limit: PAGE_LIMIT,
                tenant_id: self.tenant_id.clone(),
                search: name.to_string(),
                ..Default::default()
            }))
            .await
            .map_err(remote)?
            .into_inner();
        if let Some(existing) = listed.result.iter().find(|p| p.name == name) {
            debug!(profile = name, id = %existing.id, "Reusing device-profile");
            return Ok(existing.id.clone());
        }

        let created = profiles
            .create(self.request(CreateDeviceProfileRequest {
                device_profile: Some(DeviceProfile {
                    tenant_id: self.tenant_id.clone(),
                    name: name.to_string(),
                    region: self.region().into(),
                    mac_version: self.mac_version().into(),
                    reg_params_revision: RegParamsRevision::A.into(),
                    adr_algorithm_id: self.defaults.adr_algorithm_id.clone(),
                    uplink_interval: self.defaults.uplink_interval,
                    payload_codec_runtime: CodecRuntime::Js.into(),
                    payload_codec_script: codec.to_string(),
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?
            .into_inner();
        info!(profile = name, id = %created.id, "Created device-profile");
        Ok(created.id)
    }

    async fn delete_profile(&self, name: &str) -> BridgeResult<()> {
        let mut profiles = DeviceProfileServiceClient::new(self.channel.clone());
        let listed = profiles
            .list(self.request(ListDeviceProfilesRequest {
                limit: PAGE_LIMIT,
                tenant_id: self.tenant_id.clone(),
                search: name.to_string(),
                ..Default::default()
            }))
            .await
            .map_err(remote)?
            .into_inner();
        for profile in listed.result.iter().filter(|p| p.name == name) {
            profiles
                .delete(self.request(DeleteDeviceProfileRequest {
                    id: profile.id.clone(),
                }))
                .await
                .map_err(remote)?;
            info!(profile = name, id = %profile.id, "Deleted device-profile");
        }
        Ok(())
    }

    async fn create_gateway(&self, gateway_id: &str, name: &str) -> BridgeResult<()> {
        let mut gateways = GatewayServiceClient::new(self.channel.clone());
        match gateways
            .get(self.request(GetGatewayRequest {
                gateway_id: gateway_id.to_string(),
            }))
            .await
        {
            Ok(_) => {
                debug!(gateway = gateway_id, "Gateway already exists");
                return Ok(());
            }
            Err(status) if status.code() == Code::NotFound => {}
            Err(status) => return Err(remote(status)),
        }

        gateways
            .create(self.request(CreateGatewayRequest {
                gateway: Some(Gateway {
                    gateway_id: gateway_id.to_string(),
                    name: name.to_string(),
                    tenant_id: self.tenant_id.clone(),
                    stats_interval: GATEWAY_STATS_INTERVAL,
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?;
        info!(gateway = gateway_id, "Created gateway");
        Ok(())
    }

    async fn update_gateway(&self, gateway_id: &str, name: &str) -> BridgeResult<()> {
        let mut gateways = GatewayServiceClient::new(self.channel.clone());
        let existing = gateways
            .get(self.request(GetGatewayRequest {
                gateway_id: gateway_id.to_string(),
            }))
            .await
            .map_err(remote)?
            .into_inner()
            .gateway
            .ok_or_else(|| BridgeError::NotFound(format!("gateway '{gateway_id}'")))?;

        gateways
            .update(self.request(UpdateGatewayRequest {
                gateway: Some(Gateway {
                    gateway_id: gateway_id.to_string(),
                    name: name.to_string(),
                    tenant_id: existing.tenant_id,
                    stats_interval: GATEWAY_STATS_INTERVAL,
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?;
        info!(gateway = gateway_id, "Updated gateway");
        Ok(())
    }

    async fn delete_gateway(&self, gateway_id: &str) -> BridgeResult<()> {
        let mut gateways = GatewayServiceClient::new(self.channel.clone());
        gateways
            .delete(self.request(DeleteGatewayRequest {
                gateway_id: gateway_id.to_string(),
            }))
            .await
            .map_err(remote)?;
        info!(gateway = gateway_id, "Deleted gateway");
        Ok(())
    }

    async fn create_device(&self, dev_eui: &str, name: &str, profile_id: &str) -> BridgeResult<()> {
        let mut devices = DeviceServiceClient::new(self.channel.clone());
        devices
            .create(self.request(CreateDeviceRequest {
                device: Some(Device {
                    dev_eui: dev_eui.to_string(),
                    name: name.to_string(),
                    application_id: self.application_id.clone(),
                    device_profile_id: profile_id.to_string(),
                    skip_fcnt_check: true,
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?;
        info!(eui = dev_eui, device = name, "Created device");
        Ok(())
    }

    /// ABP activation: draw a random DevAddr from the server and set
    /// the one configured key as all four session keys.
    async fn activate_device(&self, dev_eui: &str, key: &str) -> BridgeResult<()> {
        let mut devices = DeviceServiceClient::new(self.channel.clone());
        let addr = devices
            .get_random_dev_addr(self.request(GetRandomDevAddrRequest {
                dev_eui: dev_eui.to_string(),
            }))
            .await
            .map_err(remote)?
            .into_inner();

        devices
            .activate(self.request(ActivateDeviceRequest {
                device_activation: Some(DeviceActivation {
                    dev_eui: dev_eui.to_string(),
                    dev_addr: addr.dev_addr.clone(),
                    app_s_key: key.to_string(),
                    nwk_s_enc_key: key.to_string(),
                    s_nwk_s_int_key: key.to_string(),
                    f_nwk_s_int_key: key.to_string(),
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?;
        info!(eui = dev_eui, dev_addr = %addr.dev_addr, "Activated device");
        Ok(())
    }

    async fn update_device(&self, dev_eui: &str, name: &str) -> BridgeResult<()> {
        let mut devices = DeviceServiceClient::new(self.channel.clone());
        let existing = devices
            .get(self.request(GetDeviceRequest {
                dev_eui: dev_eui.to_string(),
            }))
            .await
            .map_err(remote)?
            .into_inner()
            .device
            .ok_or_else(|| BridgeError::NotFound(format!("device '{dev_eui}'")))?;

        devices
            .update(self.request(UpdateDeviceRequest {
                device: Some(Device {
                    dev_eui: dev_eui.to_string(),
                    name: name.to_string(),
                    application_id: existing.application_id,
                    device_profile_id: existing.device_profile_id,
                    skip_fcnt_check: true,
                    ..Default::default()
                }),
            }))
            .await
            .map_err(remote)?;
        info!(eui = dev_eui, device = name, "Updated device");
        Ok(())
    }

    async fn delete_device(&self, dev_eui: &str) -> BridgeResult<()> {
        let mut devices = DeviceServiceClient::new(self.channel.clone());
        devices
            .delete(self.request(DeleteDeviceRequest {
                dev_eui: dev_eui.to_string(),
            }))
            .await
            .map_err(remote)?;
        info!(eui = dev_eui, "Deleted device");
        Ok(())
    }

    async fn open_event_stream(
        &self,
        dev_eui: &str,
        cancel: CancellationToken,
    ) -> BridgeResult<Box<dyn EventStream>> {
        let mut internal = InternalServiceClient::new(self.channel.clone());
        let stream = internal
            .stream_device_events(self.request(StreamDeviceEventsRequest {
                dev_eui: dev_eui.to_string(),
            }))
            .await
            .map_err(remote)?
            .into_inner();
        debug!(eui = dev_eui, "Opened device event stream");
        Ok(Box::new(ChirpStackEventStream::new(stream, cancel)))
    }
}
