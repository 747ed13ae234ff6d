#![allow(dead_code)]

use async_trait::async_trait;
use lora_bridge_core::{
    BridgeError, BridgeResult, Device, DeviceProfile, DeviceResource, EventStream,
    InMemoryMetadataProvider, NetworkServerClient, ProtocolProperties, StreamEvent, LORA_CODEC,
    LORA_EUI, LORA_GATEWAY, LORA_PROTOCOL, UPLINK_EVENT,
};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

type ScriptedItem = BridgeResult<StreamEvent>;

/// Handle a test keeps to feed a scripted event stream.
pub struct StreamScript {
    tx: mpsc::UnboundedSender<ScriptedItem>,
    received: Arc<AtomicUsize>,
}

impl StreamScript {
    /// Push one uplink event carrying a JSON body.
    pub fn push_uplink(&self, body: serde_json::Value) {
        let _ = self.tx.send(Ok(StreamEvent {
            kind: UPLINK_EVENT.to_string(),
            body: body.to_string(),
        }));
    }

    pub fn push_event(&self, kind: &str, body: &str) {
        let _ = self.tx.send(Ok(StreamEvent {
            kind: kind.to_string(),
            body: body.to_string(),
        }));
    }

    pub fn push_error(&self, message: &str) {
        let _ = self.tx.send(Err(BridgeError::Transport(message.to_string())));
    }

    /// Number of items the drain loop has pulled off this stream.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Acquire)
    }
}

struct ScriptedStream {
    rx: mpsc::UnboundedReceiver<ScriptedItem>,
    cancel: CancellationToken,
    received: Arc<AtomicUsize>,
}

#[async_trait]
impl EventStream for ScriptedStream {
    async fn recv(&mut self) -> BridgeResult<Option<StreamEvent>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(None),
            item = self.rx.recv() => match item {
                Some(Ok(event)) => {
                    self.received.fetch_add(1, Ordering::AcqRel);
                    Ok(Some(event))
                }
                Some(Err(e)) => Err(e),
                None => Ok(None),
            },
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// In-memory network server double: records every call, opens
/// scripted streams and supports per-operation failure injection.
#[derive(Default)]
pub struct MockNetworkServer {
    pub calls: Mutex<Vec<String>>,
    pub fail_delete_device: AtomicBool,
    pub fail_open_stream: AtomicBool,
    pub fail_create_device: AtomicBool,
    scripts: Mutex<HashMap<String, Vec<StreamScriptState>>>,
}

struct StreamScriptState {
    tx: Option<mpsc::UnboundedSender<ScriptedItem>>,
    received: Arc<AtomicUsize>,
}

impl MockNetworkServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Script handle for the most recently opened stream on `eui`.
    pub fn script_for(&self, eui: &str) -> StreamScript {
        let scripts = self.scripts.lock().unwrap();
        let state = scripts
            .get(eui)
            .and_then(|v| v.last())
            .unwrap_or_else(|| panic!("no stream opened for eui '{eui}'"));
        StreamScript {
            tx: state
                .tx
                .clone()
                .unwrap_or_else(|| panic!("stream for eui '{eui}' already ended")),
            received: Arc::clone(&state.received),
        }
    }

    /// Drop the mock's sender for the latest stream on `eui`. Once
    /// every script handle is dropped too, the stream reports end of
    /// stream after its buffered events.
    pub fn end_stream(&self, eui: &str) {
        if let Some(state) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(eui)
            .and_then(|v| v.last_mut())
        {
            state.tx = None;
        }
    }

    pub fn open_count(&self, eui: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(eui)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl NetworkServerClient for MockNetworkServer {
    async fn ensure_profile(&self, name: &str, _codec: &str) -> BridgeResult<String> {
        self.record(format!("ensure_profile:{name}"));
        Ok(format!("profile-id-{name}"))
    }

    async fn delete_profile(&self, name: &str) -> BridgeResult<()> {
        self.record(format!("delete_profile:{name}"));
        Ok(())
    }

    async fn create_gateway(&self, gateway_id: &str, name: &str) -> BridgeResult<()> {
        self.record(format!("create_gateway:{gateway_id}:{name}"));
        Ok(())
    }

    async fn update_gateway(&self, gateway_id: &str, name: &str) -> BridgeResult<()> {
        self.record(format!("update_gateway:{gateway_id}:{name}"));
        Ok(())
    }

    async fn delete_gateway(&self, gateway_id: &str) -> BridgeResult<()> {
        self.record(format!("delete_gateway:{gateway_id}"));
        Ok(())
    }

    async fn create_device(&self, dev_eui: &str, name: &str, profile_id: &str) -> BridgeResult<()> {
        self.record(format!("create_device:{dev_eui}:{name}:{profile_id}"));
        if self.fail_create_device.load(Ordering::Acquire) {
            return Err(BridgeError::RemoteCall("create device refused".into()));
        }
        Ok(())
    }

    async fn activate_device(&self, dev_eui: &str, _key: &str) -> BridgeResult<()> {
        self.record(format!("activate_device:{dev_eui}"));
        Ok(())
    }

    async fn update_device(&self, dev_eui: &str, name: &str) -> BridgeResult<()> {
        self.record(format!("update_device:{dev_eui}:{name}"));
        Ok(())
    }

    async fn delete_device(&self, dev_eui: &str) -> BridgeResult<()> {
        self.record(format!("delete_device:{dev_eui}"));
        if self.fail_delete_device.load(Ordering::Acquire) {
            return Err(BridgeError::RemoteCall("delete device refused".into()));
        }
        Ok(())
    }

    async fn open_event_stream(
        &self,
        dev_eui: &str,
        cancel: CancellationToken,
    ) -> BridgeResult<Box<dyn EventStream>> {
        self.record(format!("open_event_stream:{dev_eui}"));
        if self.fail_open_stream.load(Ordering::Acquire) {
            return Err(BridgeError::RemoteCall("stream open refused".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let received = Arc::new(AtomicUsize::new(0));
        self.scripts
            .lock()
            .unwrap()
            .entry(dev_eui.to_string())
            .or_default()
            .push(StreamScriptState {
                tx: Some(tx),
                received: Arc::clone(&received),
            });
        Ok(Box::new(ScriptedStream {
            rx,
            cancel,
            received,
        }))
    }
}

pub fn lora_protocols(eui: &str, gateway: bool) -> ProtocolProperties {
    let mut section = HashMap::new();
    section.insert(LORA_EUI.to_string(), json!(eui));
    section.insert(LORA_GATEWAY.to_string(), json!(gateway));
    let mut protocols = HashMap::new();
    protocols.insert(LORA_PROTOCOL.to_string(), section);
    protocols
}

pub fn test_device(name: &str, profile_name: &str, eui: &str, gateway: bool) -> Device {
    Device {
        name: name.to_string(),
        profile_name: profile_name.to_string(),
        protocols: lora_protocols(eui, gateway),
    }
}

/// Profile declaring one codec-marked data resource, as a session
/// start requires.
pub fn codec_profile(name: &str, source_name: &str) -> DeviceProfile {
    DeviceProfile {
        name: name.to_string(),
        device_resources: vec![DeviceResource {
            name: source_name.to_string(),
            optional: HashMap::from([(
                LORA_CODEC.to_string(),
                json!("function decodeUplink(input) { return { data: input.bytes }; }"),
            )]),
        }],
    }
}

/// Profile declaring no data resources at all.
pub fn empty_profile(name: &str) -> DeviceProfile {
    DeviceProfile {
        name: name.to_string(),
        device_resources: Vec::new(),
    }
}

pub fn provider(
    devices: Vec<Device>,
    profiles: Vec<DeviceProfile>,
) -> Arc<InMemoryMetadataProvider> {
    InMemoryMetadataProvider::new(devices, profiles)
}
