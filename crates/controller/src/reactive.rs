use std::sync::Arc;

use shared::state::State;
use tokio::sync::watch;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::trace;

use crate::globals::Globals;

/// A unit re-run on every cycle that turns state changes into engine queries.
///
/// `run` must return quickly when nothing it watches has changed.
pub trait ReactiveController: Send {
    fn name(&self) -> &'static str;
    fn run(&mut self);
}

/// Owns the run cycle: one pass over every controller per observed state change.
pub struct ControllerScheduler {
    controllers: Vec<Box<dyn ReactiveController>>,
    state: watch::Receiver<Arc<State>>,
}

impl ControllerScheduler {
    pub fn new(globals: &Globals) -> Self {
        Self {
            controllers: Vec::new(),
            state: globals.watch(),
        }
    }

    pub fn add(&mut self, controller: impl ReactiveController + 'static) {
        self.controllers.push(Box::new(controller));
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn run_cycle(&mut self) {
        for controller in &mut self.controllers {
            trace!(controller = controller.name(), "scheduler: run");
            controller.run();
        }
    }

    /// Runs a cycle now and after every state change until the state owner goes away.
    pub async fn run(mut self) {
        let mut changes = WatchStream::new(self.state.clone());
        while changes.next().await.is_some() {
            self.run_cycle();
        }
    }
}
