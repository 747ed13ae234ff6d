use async_trait::async_trait;
use chirpstack_api::api::LogItem;
use lora_bridge_core::{BridgeError, BridgeResult, EventStream, StreamEvent};
use tokio_util::sync::CancellationToken;
use tonic::Streaming;

/// Server-streaming device event feed.
///
/// Cancellation is observed locally: a cancelled receive reports end
/// of stream, and dropping the wrapper tears down the underlying gRPC
/// stream.
pub(crate) struct ChirpStackEventStream {
    inner: Streaming<LogItem>,
    cancel: CancellationToken,
}

impl ChirpStackEventStream {
    pub(crate) fn new(inner: Streaming<LogItem>, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

#[async_trait]
impl EventStream for ChirpStackEventStream {
    async fn recv(&mut self) -> BridgeResult<Option<StreamEvent>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(None),
            message = self.inner.message() => match message {
                Ok(Some(item)) => Ok(Some(StreamEvent {
                    kind: item.description,
                    body: item.body,
                })),
                Ok(None) => Ok(None),
                Err(status) => Err(BridgeError::Transport(status.to_string())),
            },
        }
    }

    async fn close(&mut self) {}
}
