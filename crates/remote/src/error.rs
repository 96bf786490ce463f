use shared::{domain::PortId, error::RemoteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel closed while call to `{method}` was outstanding")]
    ChannelClosed { method: String },
    #[error("remote call `{method}` failed: {source}")]
    Remote {
        method: String,
        #[source]
        source: RemoteError,
    },
    #[error("failed to encode or decode rpc payload: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("no port registered under {0:?}")]
    UnknownPort(PortId),
}

impl TransportError {
    /// Error reported by the remote target, if the call got that far.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}
