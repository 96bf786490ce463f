use serde::{Deserialize, Serialize};

use crate::domain::{EngineId, TimeSpan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Navigate {
        route: String,
    },
    OpenTrace {
        url: String,
    },
    /// Registers an engine fed from a local payload. The bytes themselves never enter state.
    OpenTraceFromFile {
        name: String,
        size_bytes: u64,
    },
    SetEngineReady {
        engine_id: EngineId,
        ready: bool,
    },
    /// Marks an engine whose trace could not be loaded.
    SetEngineFailed {
        engine_id: EngineId,
        message: String,
    },
    SetTraceTime {
        span: TimeSpan,
    },
    SetVisibleWindow {
        span: TimeSpan,
    },
    SelectSlice {
        ts: i64,
    },
    Deselect,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "NAVIGATE",
            Self::OpenTrace { .. } => "OPEN_TRACE",
            Self::OpenTraceFromFile { .. } => "OPEN_TRACE_FROM_FILE",
            Self::SetEngineReady { .. } => "SET_ENGINE_READY",
            Self::SetEngineFailed { .. } => "SET_ENGINE_FAILED",
            Self::SetTraceTime { .. } => "SET_TRACE_TIME",
            Self::SetVisibleWindow { .. } => "SET_VISIBLE_WINDOW",
            Self::SelectSlice { .. } => "SELECT_SLICE",
            Self::Deselect => "DESELECT",
        }
    }
}
