use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{EngineConfig, EngineId, SliceSelection, TimeSpan};

pub const VIEWER_ROUTE: &str = "/viewer";

/// Canonical application snapshot. Only the controller produces new values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub route: Option<String>,
    pub next_id: i64,
    #[serde(default)]
    pub engines: BTreeMap<EngineId, EngineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_time: Option<TimeSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_window: Option<TimeSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_slice: Option<SliceSelection>,
}

impl State {
    pub fn engine(&self, engine_id: EngineId) -> Option<&EngineConfig> {
        self.engines.get(&engine_id)
    }

    pub fn ready_engines(&self) -> impl Iterator<Item = &EngineConfig> {
        self.engines.values().filter(|engine| engine.ready)
    }
}

pub fn create_empty_state() -> State {
    State::default()
}
