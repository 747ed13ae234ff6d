use crate::BridgeResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One message received from a device event stream.
///
/// `kind` is the remote event tag (only [`crate::types::UPLINK_EVENT`]
/// messages are useful); `body` is the raw payload, decoded by the
/// session drain loop.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub kind: String,
    pub body: String,
}

/// Server-streamed event subscription for a single device.
///
/// `recv` blocks until the next message, returns `Ok(None)` at end of
/// stream, and an error on transport failure. The handle is owned
/// exclusively by the session that opened it.
#[async_trait]
pub trait EventStream: Send {
    async fn recv(&mut self) -> BridgeResult<Option<StreamEvent>>;
    /// Best-effort teardown; further `recv` calls are undefined.
    async fn close(&mut self);
}

/// Capability interface over the remote network server.
///
/// Concrete API-version adapters are injected at composition time;
/// the session manager and the orchestrator depend only on this
/// trait. All CRUD calls are stateless, so one client is shared
/// read-only across every session.
#[async_trait]
pub trait NetworkServerClient: Send + Sync {
    /// Return the id of a remote device-profile with this name,
    /// reusing an existing one when the remote side already lists it.
    async fn ensure_profile(&self, name: &str, codec: &str) -> BridgeResult<String>;
    async fn delete_profile(&self, name: &str) -> BridgeResult<()>;

    async fn create_gateway(&self, gateway_id: &str, name: &str) -> BridgeResult<()>;
    async fn update_gateway(&self, gateway_id: &str, name: &str) -> BridgeResult<()>;
    async fn delete_gateway(&self, gateway_id: &str) -> BridgeResult<()>;

    async fn create_device(&self, dev_eui: &str, name: &str, profile_id: &str)
        -> BridgeResult<()>;
    async fn activate_device(&self, dev_eui: &str, key: &str) -> BridgeResult<()>;
    async fn update_device(&self, dev_eui: &str, name: &str) -> BridgeResult<()>;
    async fn delete_device(&self, dev_eui: &str) -> BridgeResult<()>;

    /// Open the event subscription for `dev_eui`. The cancellation
    /// token is honored by the returned stream's `recv`.
    async fn open_event_stream(
        &self,
        dev_eui: &str,
        cancel: CancellationToken,
    ) -> BridgeResult<Box<dyn EventStream>>;
}
