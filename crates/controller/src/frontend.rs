use remote::{Remote, TransportError};
use shared::{domain::PortId, protocol::methods, state::State};
use tracing::warn;

/// Controller-side handle on the rendering context.
#[derive(Clone)]
pub struct FrontendProxy {
    remote: Remote,
}

impl FrontendProxy {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    /// Queues the full state for the rendering side without waiting for it to land.
    pub fn update_state(&self, state: &State) {
        let args = match serde_json::to_value(state) {
            Ok(value) => vec![value],
            Err(error) => {
                warn!(%error, "controller: state is not serializable, push skipped");
                return;
            }
        };
        match self.remote.call::<()>(methods::UPDATE_STATE, args) {
            Ok(pending) => {
                tokio::spawn(async move {
                    if let Err(error) = pending.await {
                        warn!(%error, "controller: frontend rejected state update");
                    }
                });
            }
            Err(error) => warn!(%error, "controller: failed to push state"),
        }
    }

    /// Asks the rendering side for a channel to a freshly started engine.
    pub async fn create_engine_port(&self) -> Result<PortId, TransportError> {
        self.remote.send(methods::CREATE_ENGINE_PORT, Vec::new()).await
    }
}
