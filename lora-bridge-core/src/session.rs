use crate::{
    client::{EventStream, NetworkServerClient},
    metadata::{resolve_uplink_resource, Device, DeviceMetadataProvider},
    types::{DecodedReading, LoraProtocolParams, UPLINK_EVENT},
    BridgeError, BridgeResult,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, Mutex, MutexGuard},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One device's live event subscription.
///
/// The stream handle lives inside the drain task; the registry entry
/// only holds what is needed to stop and observe it.
struct Session {
    eui: String,
    cancel: CancellationToken,
    drain: JoinHandle<()>,
}

/// Owns every active [`Session`] and guarantees at most one live
/// session per device name.
///
/// All registry mutation goes through one async mutex: mutation
/// frequency is bounded by device churn, and `replace` needs a
/// consistent remove-then-insert, so whole-registry locking is
/// simpler than per-key locks and also serializes concurrent
/// `replace`/`cancel` calls for the same device.
pub struct SessionManager {
    client: Arc<dyn NetworkServerClient>,
    metadata: Arc<dyn DeviceMetadataProvider>,
    sink: mpsc::Sender<DecodedReading>,
    registry: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn NetworkServerClient>,
        metadata: Arc<dyn DeviceMetadataProvider>,
        sink: mpsc::Sender<DecodedReading>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            metadata,
            sink,
            registry: Mutex::new(HashMap::new()),
        })
    }

    /// Open a subscription for a non-gateway device and start draining
    /// it in the background.
    ///
    /// Returns once the stream is confirmed open or the open attempt
    /// failed; this is the only point where stream errors are
    /// synchronous to the caller. The device's profile must declare
    /// exactly one codec-marked data resource, checked before any
    /// remote call is made.
    pub async fn start(&self, device: &Device, eui: &str) -> BridgeResult<()> {
        let mut registry = self.registry.lock().await;
        self.start_locked(&mut registry, device, eui).await
    }

    /// Cancel any existing session for this device, then start a new
    /// one against the (possibly changed) EUI. Remove-before-insert
    /// happens under one critical section, so two sessions for the
    /// same name never drain into the sink at the same time.
    pub async fn replace(&self, device: &Device, eui: &str) -> BridgeResult<()> {
        let mut registry = self.registry.lock().await;
        if let Some(old) = registry.remove(&device.name) {
            stop_session(&device.name, old).await;
        }
        self.start_locked(&mut registry, device, eui).await
    }

    /// Stop and remove the session for `device_name`. Idempotent: a
    /// missing session is a no-op.
    ///
    /// A reading already committed to the sink before the drain loop
    /// observed cancellation may still be consumed afterwards; at most
    /// one such reading can appear after this returns.
    pub async fn cancel(&self, device_name: &str) -> BridgeResult<()> {
        let mut registry = self.registry.lock().await;
        match registry.remove(device_name) {
            Some(session) => {
                stop_session(device_name, session).await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Start sessions for every non-gateway device in the list. Called
    /// once at startup; a failure for one device is logged and skipped
    /// and never aborts the rest.
    pub async fn rebuild(&self, devices: &[Device]) {
        for device in devices {
            let params = match LoraProtocolParams::from_protocols(&device.protocols) {
                Ok(p) => p,
                Err(e) => {
                    warn!(device = %device.name, error = %e, "Skipping device with invalid protocol properties");
                    continue;
                }
            };
            if params.gateway {
                debug!(device = %device.name, "Skipping gateway during rebuild");
                continue;
            }
            if let Err(e) = self.start(device, &params.eui).await {
                warn!(device = %device.name, error = %e, "Failed to start session during rebuild");
            }
        }
    }

    /// Whether a session is currently registered for `device_name`.
    pub async fn has_session(&self, device_name: &str) -> bool {
        self.registry.lock().await.contains_key(device_name)
    }

    /// EUI the registered session for `device_name` is subscribed
    /// against, if any.
    pub async fn session_eui(&self, device_name: &str) -> Option<String> {
        self.registry
            .lock()
            .await
            .get(device_name)
            .map(|s| s.eui.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Cancel every session. Used at shutdown.
    pub async fn cancel_all(&self) {
        let mut registry = self.registry.lock().await;
        for (name, session) in registry.drain() {
            stop_session(&name, session).await;
        }
    }

    async fn start_locked(
        &self,
        registry: &mut MutexGuard<'_, HashMap<String, Session>>,
        device: &Device,
        eui: &str,
    ) -> BridgeResult<()> {
        if registry.contains_key(&device.name) {
            return Err(BridgeError::Session(format!(
                "session for device '{}' already exists",
                device.name
            )));
        }

        // Hard precondition, resolved before touching the remote side.
        let resource = resolve_uplink_resource(self.metadata.as_ref(), device).await?;

        let cancel = CancellationToken::new();
        let stream = self
            .client
            .open_event_stream(eui, cancel.clone())
            .await?;

        info!(device = %device.name, eui, source = %resource.name, "Device event stream opened");

        let drain = tokio::spawn(drain_stream(
            device.name.clone(),
            resource.name.clone(),
            stream,
            self.sink.clone(),
            cancel.clone(),
        ));

        registry.insert(
            device.name.clone(),
            Session {
                eui: eui.to_string(),
                cancel,
                drain,
            },
        );
        Ok(())
    }
}

/// Request teardown and wait for the drain task's completion signal.
async fn stop_session(device_name: &str, session: Session) {
    session.cancel.cancel();
    if let Err(e) = session.drain.await {
        warn!(device = %device_name, error = %e, "Session drain task aborted");
    }
    debug!(device = %device_name, "Session cancelled");
}

/// Per-session drain loop: `Open -> Streaming -> Closed`.
///
/// Blocks only on the next stream message and on the sink push; both
/// are raced against the cancellation token, which is also checked
/// again after each receive. End of stream, cancellation and
/// transport errors all lead to `Closed`; there is no retry at this
/// layer.
async fn drain_stream(
    device_name: String,
    source_name: String,
    mut stream: Box<dyn EventStream>,
    sink: mpsc::Sender<DecodedReading>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            r = stream.recv() => r,
        };
        if cancel.is_cancelled() {
            break;
        }
        let event = match received {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!(device = %device_name, "Device event stream ended");
                break;
            }
            Err(e) => {
                warn!(device = %device_name, error = %e, "Device event stream receive failed");
                break;
            }
        };

        // Only uplink events carry data; everything else is noise.
        if event.kind != UPLINK_EVENT {
            continue;
        }
        let value: Value = match serde_json::from_str(&event.body) {
            Ok(v) => v,
            Err(e) => {
                warn!(device = %device_name, error = %e, "Incoming reading ignored: malformed payload");
                continue;
            }
        };

        let reading = DecodedReading::new(device_name.clone(), source_name.clone(), value);
        debug!(device = %device_name, source = %source_name, "Incoming reading received");
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = sink.send(reading) => {
                if sent.is_err() {
                    warn!(device = %device_name, "Uplink sink closed; stopping session");
                    break;
                }
            }
        }
    }
    stream.close().await;
    debug!(device = %device_name, "Session drain loop closed");
}
