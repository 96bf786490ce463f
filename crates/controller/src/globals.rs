use std::sync::Arc;

use shared::{domain::SliceDetails, state::State};
use tokio::sync::{broadcast, watch};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum PublishedEvent {
    SliceDetails(SliceDetails),
}

/// Read-only view of the canonical state plus the surface results are published to.
#[derive(Clone)]
pub struct Globals {
    state: watch::Receiver<Arc<State>>,
    events: broadcast::Sender<PublishedEvent>,
}

impl Globals {
    pub fn new(
        state: watch::Receiver<Arc<State>>,
        events: broadcast::Sender<PublishedEvent>,
    ) -> Self {
        Self { state, events }
    }

    /// Latest state snapshot.
    pub fn state(&self) -> Arc<State> {
        Arc::clone(&self.state.borrow())
    }

    pub fn watch(&self) -> watch::Receiver<Arc<State>> {
        self.state.clone()
    }

    pub fn publish(&self, event: PublishedEvent) {
        if self.events.send(event).is_err() {
            debug!("globals: published event has no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }
}
