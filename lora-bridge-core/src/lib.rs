//! Bridge between an IoT device-management framework and a remote
//! LoRaWAN network server.
//!
//! The core is the [`SessionManager`]: it owns one long-lived event
//! stream per known end-device, guarantees at most one live stream
//! per device, and multiplexes every received uplink into a single
//! shared channel of [`DecodedReading`] values. The [`LoraDriver`]
//! orchestrator turns device add/update/remove events into network
//! server CRUD calls plus session operations. Everything talks to the
//! remote side through the [`NetworkServerClient`] capability trait;
//! concrete API adapters are injected at composition time.

mod client;
mod config;
mod driver;
mod error;
mod metadata;
mod session;
mod types;

pub type BridgeResult<T> = Result<T, BridgeError>;

pub use client::{EventStream, NetworkServerClient, StreamEvent};
pub use config::{ChirpStackConfig, ProfileDefaults, ServiceConfig, UplinkConfig};
pub use driver::LoraDriver;
pub use error::BridgeError;
pub use metadata::{
    resolve_uplink_resource, Device, DeviceMetadataProvider, DeviceProfile, DeviceResource,
    InMemoryMetadataProvider,
};
pub use session::SessionManager;
pub use types::{
    DecodedReading, LoraProtocolParams, ProtocolProperties, LORA_CODEC, LORA_EUI, LORA_GATEWAY,
    LORA_PROTOCOL, UPLINK_EVENT,
};
