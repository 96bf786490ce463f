//! State-owning side of the viewer.
//!
//! The [`Controller`] holds the canonical [`State`], applies [`reducer::root_reducer`] to
//! each dispatched [`Action`] and pushes the result to the rendering side. Reactive
//! controllers observe the same state through [`Globals`] and turn changes into engine
//! queries.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use engine::{Engine, RemoteEngine};
use remote::{arg, to_value, PortRegistry, Remote, RemoteTarget};
use serde_json::Value;
use shared::{
    actions::Action,
    domain::{EngineId, PortId},
    error::RemoteError,
    protocol::methods,
    state::{create_empty_state, State},
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

pub mod engines;
pub mod error;
pub mod frontend;
pub mod globals;
pub mod reactive;
pub mod reducer;
mod selection_controller;

pub use engines::EngineRegistry;
pub use error::ControllerError;
pub use frontend::FrontendProxy;
pub use globals::{Globals, PublishedEvent};
pub use reactive::{ControllerScheduler, ReactiveController};
pub use selection_controller::SelectionController;

const PUBLISHED_EVENT_CAPACITY: usize = 256;

struct ControllerInner {
    state: Arc<State>,
    frontend: Option<FrontendProxy>,
}

struct ControllerCore {
    inner: Mutex<ControllerInner>,
    state_tx: watch::Sender<Arc<State>>,
    events: broadcast::Sender<PublishedEvent>,
    ports: PortRegistry,
    engines: EngineRegistry,
}

/// Sole owner and mutator of [`State`]. Clones share the same controller.
#[derive(Clone)]
pub struct Controller {
    core: Arc<ControllerCore>,
}

impl Controller {
    pub fn new(ports: PortRegistry) -> Self {
        let state = Arc::new(create_empty_state());
        let (state_tx, _) = watch::channel(Arc::clone(&state));
        let (events, _) = broadcast::channel(PUBLISHED_EVENT_CAPACITY);
        Self {
            core: Arc::new(ControllerCore {
                inner: Mutex::new(ControllerInner {
                    state,
                    frontend: None,
                }),
                state_tx,
                events,
                ports,
                engines: EngineRegistry::default(),
            }),
        }
    }

    pub fn state(&self) -> Arc<State> {
        Arc::clone(&self.lock().state)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().frontend.is_some()
    }

    pub fn globals(&self) -> Globals {
        Globals::new(self.core.state_tx.subscribe(), self.core.events.clone())
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.core.engines
    }

    pub fn engine(&self, engine_id: EngineId) -> Result<Arc<dyn Engine>, ControllerError> {
        self.core
            .engines
            .get(engine_id)
            .ok_or(ControllerError::UnknownEngine(engine_id))
    }

    /// Attaches the rendering side's channel, parked under `frontend_port`.
    ///
    /// Allowed once; returns the state as it stands.
    pub fn init(&self, frontend_port: PortId) -> Result<State, ControllerError> {
        let mut inner = self.lock();
        if inner.frontend.is_some() {
            return Err(ControllerError::AlreadyInitialized);
        }
        let port = self.core.ports.take(frontend_port)?;
        inner.frontend = Some(FrontendProxy::new(Remote::new(port)));
        info!("controller: frontend attached");
        Ok(State::clone(&inner.state))
    }

    /// Reduces `action` into a new state and queues that state for the rendering side.
    pub fn dispatch(&self, action: Action) -> Result<(), ControllerError> {
        let mut inner = self.lock();
        self.apply(&mut inner, &action)?;
        Ok(())
    }

    /// Registers a new engine for a local trace payload and starts loading it.
    ///
    /// The payload goes straight to the engine and never enters the state. Returns the id
    /// of the new engine; `SET_ENGINE_READY` follows once the trace is loaded, or
    /// `SET_ENGINE_FAILED` if it cannot be.
    pub fn load_trace_from_blob(
        &self,
        name: String,
        blob: Vec<u8>,
    ) -> Result<EngineId, ControllerError> {
        let (engine_id, frontend) = {
            let mut inner = self.lock();
            let engine_id = EngineId(inner.state.next_id);
            let frontend = self.apply(
                &mut inner,
                &Action::OpenTraceFromFile {
                    name: name.clone(),
                    size_bytes: blob.len() as u64,
                },
            )?;
            (engine_id, frontend)
        };

        let controller = self.clone();
        tokio::spawn(async move {
            match controller
                .create_engine(frontend, engine_id, &name, &blob)
                .await
            {
                Ok(engine) => controller.publish_trace_time(engine_id, engine.as_ref()).await,
                Err(error) => {
                    error!(engine_id = engine_id.0, %error, "controller: failed to create engine");
                    let failed = Action::SetEngineFailed {
                        engine_id,
                        message: error.to_string(),
                    };
                    if let Err(error) = controller.dispatch(failed) {
                        warn!(engine_id = engine_id.0, %error, "controller: could not record engine failure");
                    }
                }
            }
        });
        Ok(engine_id)
    }

    /// Loads the trace into a fresh engine, registers it and marks it ready.
    async fn create_engine(
        &self,
        frontend: FrontendProxy,
        engine_id: EngineId,
        name: &str,
        blob: &[u8],
    ) -> Result<Arc<RemoteEngine>, ControllerError> {
        let port_id = frontend.create_engine_port().await?;
        let port = self.core.ports.take(port_id)?;
        let engine = Arc::new(RemoteEngine::create(engine_id, port, name, blob).await?);
        self.core.engines.insert(engine_id, engine.clone());
        info!(engine_id = engine_id.0, name, "controller: engine ready");
        self.dispatch(Action::SetEngineReady {
            engine_id,
            ready: true,
        })?;
        Ok(engine)
    }

    async fn publish_trace_time(&self, engine_id: EngineId, engine: &RemoteEngine) {
        let span = match engine.get_trace_time_bounds().await {
            Ok(span) => span,
            Err(error) => {
                warn!(engine_id = engine_id.0, %error, "controller: trace bounds unavailable");
                return;
            }
        };
        if !span.is_valid() {
            warn!(engine_id = engine_id.0, "controller: trace has no timed events");
            return;
        }
        if let Err(error) = self.dispatch(Action::SetTraceTime { span }) {
            warn!(engine_id = engine_id.0, %error, "controller: failed to record trace time");
        }
    }

    /// Reduce, publish locally, then queue the push while still holding the lock, so
    /// pushes leave in the same order reductions happened.
    fn apply(
        &self,
        inner: &mut ControllerInner,
        action: &Action,
    ) -> Result<FrontendProxy, ControllerError> {
        let frontend = inner
            .frontend
            .clone()
            .ok_or(ControllerError::NotInitialized)?;
        let next = Arc::new(reducer::root_reducer(&inner.state, action));
        inner.state = Arc::clone(&next);
        self.core.state_tx.send_replace(Arc::clone(&next));
        debug!(action = action.kind(), "controller: action reduced");
        frontend.update_state(&next);
        Ok(frontend)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.core
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemoteTarget for Controller {
    async fn handle_call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        match method {
            methods::INIT => {
                let port_id: PortId = arg(&args, 0, method)?;
                let state = self.init(port_id)?;
                to_value(&state)
            }
            methods::DISPATCH => {
                let action: Action = arg(&args, 0, method)?;
                self.dispatch(action)?;
                Ok(Value::Null)
            }
            methods::LOAD_TRACE_FROM_BLOB => {
                let name: String = arg(&args, 0, method)?;
                let blob_b64: String = arg(&args, 1, method)?;
                let blob = STANDARD
                    .decode(blob_b64.as_bytes())
                    .map_err(|error| RemoteError::invalid_arguments(method, error))?;
                let engine_id = self.load_trace_from_blob(name, blob)?;
                to_value(&engine_id)
            }
            other => Err(RemoteError::unknown_method(other)),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
