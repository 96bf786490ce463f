use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(EngineId);

/// Opaque handle for a channel end parked in a port registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceSource {
    Url { url: String },
    File { name: String, size_bytes: u64 },
}

impl TraceSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Url { url } => url,
            Self::File { name, .. } => name,
        }
    }
}

/// Descriptor of one analytical engine instance. Replaced, never edited, inside `State`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: EngineId,
    pub source: TraceSource,
    pub ready: bool,
    /// Why loading the trace failed, if it did. A failed engine never becomes ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

/// Time interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub const NANOS_PER_SECOND: f64 = 1e9;

    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The span covering nothing: `(+inf, -inf)`. Any real bound narrows it.
    pub fn unbounded() -> Self {
        Self {
            start: f64::INFINITY,
            end: f64::NEG_INFINITY,
        }
    }

    pub fn from_nanos(start_ns: f64, end_ns: f64) -> Self {
        Self {
            start: start_ns / Self::NANOS_PER_SECOND,
            end: end_ns / Self::NANOS_PER_SECOND,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, seconds: f64) -> bool {
        self.start <= seconds && seconds <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceSelection {
    /// Raw trace timestamp in nanoseconds.
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceDetails {
    pub ts: i64,
    pub dur: i64,
    pub priority: i64,
    pub end_state: String,
}
