use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use remote::{arg, forward_calls, to_value, MessagePort, RemoteTarget};
use serde_json::Value;
use shared::{
    error::RemoteError,
    protocol::{methods, QueryArgs},
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{Engine, QueryError, SqliteEngine};

/// Hosts one [`SqliteEngine`] behind a channel: `loadTrace` then any number of `query`.
pub struct EngineWorker {
    trace_dir: PathBuf,
    engine: RwLock<Option<SqliteEngine>>,
}

impl EngineWorker {
    pub fn new(trace_dir: impl Into<PathBuf>) -> Self {
        Self {
            trace_dir: trace_dir.into(),
            engine: RwLock::new(None),
        }
    }

    async fn load_trace(&self, name: &str, blob: &[u8]) -> Result<(), QueryError> {
        let engine = SqliteEngine::from_trace_bytes(&self.trace_dir, name, blob).await?;
        let previous = self.engine.write().await.replace(engine);
        if let Some(previous) = previous {
            warn!(name, "engine: replacing previously loaded trace");
            previous.close().await;
        }
        info!(name, "engine: trace loaded");
        Ok(())
    }

    async fn query(&self, sql_text: &str) -> Result<Value, RemoteError> {
        let engine = self
            .engine
            .read()
            .await
            .clone()
            .ok_or(QueryError::NoTraceLoaded)?;
        let result = engine.query(sql_text).await?;
        to_value(&result)
    }
}

#[async_trait]
impl RemoteTarget for EngineWorker {
    async fn handle_call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        match method {
            methods::LOAD_TRACE => {
                let name: String = arg(&args, 0, method)?;
                let blob_b64: String = arg(&args, 1, method)?;
                let blob = STANDARD
                    .decode(blob_b64.as_bytes())
                    .map_err(|error| RemoteError::invalid_arguments(method, error))?;
                self.load_trace(&name, &blob).await?;
                Ok(Value::Null)
            }
            methods::QUERY => {
                let query: QueryArgs = arg(&args, 0, method)?;
                self.query(&query.sql_text).await
            }
            other => Err(RemoteError::unknown_method(other)),
        }
    }
}

/// Starts a worker task and returns the port its caller talks through.
pub fn spawn_engine_worker(trace_dir: impl Into<PathBuf>) -> MessagePort {
    let (caller, callee) = MessagePort::pair();
    forward_calls(callee, Arc::new(EngineWorker::new(trace_dir)));
    caller
}
