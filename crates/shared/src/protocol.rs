use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;

pub mod methods {
    //! Method names shared by both sides of each channel.

    pub const UPDATE_STATE: &str = "updateState";
    pub const CREATE_ENGINE_PORT: &str = "createEnginePort";

    pub const INIT: &str = "init";
    pub const DISPATCH: &str = "dispatch";
    pub const LOAD_TRACE_FROM_BLOB: &str = "loadTraceFromBlob";

    pub const LOAD_TRACE: &str = "loadTrace";
    pub const QUERY: &str = "query";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    pub outcome: RpcOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RpcOutcome {
    Ok(Value),
    Err(RemoteError),
}

impl From<Result<Value, RemoteError>> for RpcOutcome {
    fn from(value: Result<Value, RemoteError>) -> Self {
        match value {
            Ok(value) => Self::Ok(value),
            Err(error) => Self::Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryArgs {
    pub sql_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Int,
    Float,
    String,
}

/// One homogeneous column. SQL NULL is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    String(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Int(_) => ColumnKind::Int,
            Self::Float(_) => ColumnKind::Float,
            Self::String(_) => ColumnKind::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        self.values.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn long(&self, column: usize, row: usize) -> Option<i64> {
        match &self.columns.get(column)?.values {
            ColumnValues::Int(values) => values.get(row).copied().flatten(),
            _ => None,
        }
    }

    pub fn string(&self, column: usize, row: usize) -> Option<&str> {
        match &self.columns.get(column)?.values {
            ColumnValues::String(values) => values.get(row)?.as_deref(),
            _ => None,
        }
    }

    /// Numeric view of a cell, accepting both integer and float columns.
    pub fn number(&self, column: usize, row: usize) -> Option<f64> {
        match &self.columns.get(column)?.values {
            ColumnValues::Int(values) => values.get(row).copied().flatten().map(|v| v as f64),
            ColumnValues::Float(values) => values.get(row).copied().flatten(),
            ColumnValues::String(_) => None,
        }
    }
}
