use thiserror::Error;
use tokio::sync::mpsc;

/// Bridge specific errors
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Missing protocol parameter: {0}")]
    MissingParameter(String),
    #[error("Missing codec: {0}")]
    MissingCodec(String),
    #[error("Device resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Remote call failed: {0}")]
    RemoteCall(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Session error: {0}")]
    Session(String),
    #[error("Uplink sink error: {0}")]
    Sink(String),
}

impl<T> From<mpsc::error::SendError<T>> for BridgeError {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        BridgeError::Sink(format!("Channel send failed: {err}"))
    }
}
