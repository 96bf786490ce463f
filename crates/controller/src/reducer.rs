//! Pure state transitions: one `Action` in, one new `State` out.

use shared::{
    actions::Action,
    domain::{EngineConfig, EngineId, SliceSelection, TraceSource},
    state::{State, VIEWER_ROUTE},
};

/// Computes the state following `action`. The input is never modified.
///
/// Spans that are not finite and ordered are ignored, since they cannot cross the wire.
pub fn root_reducer(state: &State, action: &Action) -> State {
    let mut next = state.clone();
    match action {
        Action::Navigate { route } => {
            next.route = Some(route.clone());
        }
        Action::OpenTrace { url } => {
            open_engine(&mut next, TraceSource::url(url.clone()));
        }
        Action::OpenTraceFromFile { name, size_bytes } => {
            open_engine(
                &mut next,
                TraceSource::File {
                    name: name.clone(),
                    size_bytes: *size_bytes,
                },
            );
        }
        Action::SetEngineReady { engine_id, ready } => {
            if let Some(engine) = next.engines.get(engine_id) {
                let updated = EngineConfig {
                    ready: *ready,
                    ..engine.clone()
                };
                next.engines.insert(*engine_id, updated);
            }
        }
        Action::SetEngineFailed { engine_id, message } => {
            if let Some(engine) = next.engines.get(engine_id) {
                let updated = EngineConfig {
                    ready: false,
                    load_error: Some(message.clone()),
                    ..engine.clone()
                };
                next.engines.insert(*engine_id, updated);
            }
        }
        Action::SetTraceTime { span } => {
            if span.is_valid() {
                next.trace_time = Some(*span);
                if next.visible_window.is_none() {
                    next.visible_window = Some(*span);
                }
            }
        }
        Action::SetVisibleWindow { span } => {
            if span.is_valid() {
                next.visible_window = Some(*span);
            }
        }
        Action::SelectSlice { ts } => {
            next.selected_slice = Some(SliceSelection { ts: *ts });
        }
        Action::Deselect => {
            next.selected_slice = None;
        }
    }
    next
}

fn open_engine(state: &mut State, source: TraceSource) {
    let id = EngineId(state.next_id);
    state.next_id += 1;
    state.engines.insert(
        id,
        EngineConfig {
            id,
            source,
            ready: false,
            load_error: None,
        },
    );
    state.route = Some(VIEWER_ROUTE.to_string());
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
