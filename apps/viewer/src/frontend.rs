use std::path::PathBuf;

use async_trait::async_trait;
use engine::spawn_engine_worker;
use remote::{arg, to_value, PortRegistry, RemoteTarget};
use serde_json::Value;
use shared::{
    error::RemoteError,
    protocol::methods,
    state::{create_empty_state, State},
};
use tokio::sync::watch;
use tracing::{debug, info};

/// Rendering side without a screen: keeps the latest pushed state and starts engines.
pub struct HeadlessFrontend {
    state: watch::Sender<State>,
    ports: PortRegistry,
    trace_dir: PathBuf,
}

impl HeadlessFrontend {
    pub fn new(ports: PortRegistry, trace_dir: PathBuf) -> (Self, watch::Receiver<State>) {
        let (state, rx) = watch::channel(create_empty_state());
        (
            Self {
                state,
                ports,
                trace_dir,
            },
            rx,
        )
    }
}

#[async_trait]
impl RemoteTarget for HeadlessFrontend {
    async fn handle_call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        match method {
            methods::UPDATE_STATE => {
                let state: State = arg(&args, 0, method)?;
                debug!(
                    route = ?state.route,
                    engines = state.engines.len(),
                    selected = ?state.selected_slice.map(|s| s.ts),
                    "viewer: state updated"
                );
                self.state.send_replace(state);
                Ok(Value::Null)
            }
            methods::CREATE_ENGINE_PORT => {
                let port = spawn_engine_worker(self.trace_dir.clone());
                let port_id = self.ports.transfer(port);
                info!(port_id = ?port_id, "viewer: engine worker started");
                to_value(&port_id)
            }
            other => Err(RemoteError::unknown_method(other)),
        }
    }
}
