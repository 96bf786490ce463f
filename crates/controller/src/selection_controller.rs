use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use engine::Engine;
use shared::{
    domain::{SliceDetails, SliceSelection},
    protocol::QueryResult,
};
use tracing::{debug, warn};

use crate::{
    globals::{Globals, PublishedEvent},
    reactive::ReactiveController,
};

/// Fetches the details of the selected scheduling slice and publishes them.
pub struct SelectionController {
    globals: Globals,
    engine: Arc<dyn Engine>,
    last_selected_slice: Option<SliceSelection>,
    /// Bumped per issued query; only the newest query may publish.
    generation: Arc<AtomicU64>,
}

impl SelectionController {
    pub fn new(globals: Globals, engine: Arc<dyn Engine>) -> Self {
        Self {
            globals,
            engine,
            last_selected_slice: None,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ReactiveController for SelectionController {
    fn name(&self) -> &'static str {
        "selection"
    }

    fn run(&mut self) {
        let Some(selected) = self.globals.state().selected_slice else {
            self.last_selected_slice = None;
            return;
        };
        if self.last_selected_slice == Some(selected) {
            return;
        }
        // Remember before querying so later cycles don't re-issue while this one is in flight.
        self.last_selected_slice = Some(selected);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.generation);
        let engine = Arc::clone(&self.engine);
        let globals = self.globals.clone();
        tokio::spawn(async move {
            let sql = format!(
                "SELECT ts, dur, end_state, priority FROM sched WHERE ts = {}",
                selected.ts
            );
            let result = match engine.query(&sql).await {
                Ok(result) => result,
                Err(error) => {
                    warn!(ts = selected.ts, %error, "selection: detail query failed");
                    return;
                }
            };
            if result.row_count != 1 {
                debug!(ts = selected.ts, rows = result.row_count, "selection: no unique slice at timestamp");
                return;
            }
            let Some(details) = slice_details(&result) else {
                warn!(ts = selected.ts, "selection: unexpected column types in detail row");
                return;
            };
            if latest.load(Ordering::SeqCst) != generation
                || globals.state().selected_slice != Some(selected)
            {
                debug!(ts = selected.ts, "selection: discarding stale details");
                return;
            }
            globals.publish(PublishedEvent::SliceDetails(details));
        });
    }
}

fn slice_details(result: &QueryResult) -> Option<SliceDetails> {
    Some(SliceDetails {
        ts: result.long(0, 0)?,
        dur: result.long(1, 0)?,
        end_state: result.string(2, 0).unwrap_or_default().to_string(),
        priority: result.long(3, 0)?,
    })
}

#[cfg(test)]
#[path = "tests/selection_controller_tests.rs"]
mod tests;
