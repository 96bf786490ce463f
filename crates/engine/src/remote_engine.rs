use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use remote::{MessagePort, Remote, TransportError};
use serde_json::Value;
use shared::{
    domain::EngineId,
    protocol::{methods, QueryArgs, QueryResult},
};

use crate::{Engine, QueryError};

/// Engine living on the far side of a channel, usually an [`EngineWorker`](crate::EngineWorker).
#[derive(Clone)]
pub struct RemoteEngine {
    id: EngineId,
    remote: Remote,
}

impl RemoteEngine {
    pub fn new(id: EngineId, port: MessagePort) -> Self {
        Self {
            id,
            remote: Remote::new(port),
        }
    }

    /// Connects to the engine on `port` and feeds it the trace payload.
    pub async fn create(
        id: EngineId,
        port: MessagePort,
        name: &str,
        blob: &[u8],
    ) -> Result<Self, QueryError> {
        let engine = Self::new(id, port);
        engine.load_trace(name, blob).await?;
        Ok(engine)
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub async fn load_trace(&self, name: &str, blob: &[u8]) -> Result<(), QueryError> {
        let args = vec![
            Value::String(name.to_string()),
            Value::String(STANDARD.encode(blob)),
        ];
        self.remote
            .send::<()>(methods::LOAD_TRACE, args)
            .await
            .map_err(|error| match error.remote_error() {
                Some(remote_error) => QueryError::Load(remote_error.message.clone()),
                None => QueryError::Transport(error),
            })
    }
}

#[async_trait]
impl Engine for RemoteEngine {
    async fn query(&self, sql_text: &str) -> Result<QueryResult, QueryError> {
        let args = serde_json::to_value(QueryArgs {
            sql_text: sql_text.to_string(),
        })
        .map_err(|error| QueryError::Transport(TransportError::Codec(error)))?;
        self.remote
            .send(methods::QUERY, vec![args])
            .await
            .map_err(|error| QueryError::from_transport(sql_text, error))
    }
}
