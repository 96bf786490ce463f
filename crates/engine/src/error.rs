use remote::TransportError;
use shared::error::{ErrorCode, RemoteError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query `{sql}` failed: {message}")]
    Engine { sql: String, message: String },
    #[error("query `{sql}` returned no rows")]
    EmptyResult { sql: String },
    #[error("column `{column}` holds unsupported type {type_name}")]
    UnsupportedType { column: String, type_name: String },
    #[error("no trace loaded into engine")]
    NoTraceLoaded,
    #[error("failed to load trace: {0}")]
    Load(String),
    #[error(transparent)]
    Transport(TransportError),
}

impl QueryError {
    pub(crate) fn engine(sql: &str, error: sqlx::Error) -> Self {
        Self::Engine {
            sql: sql.to_string(),
            message: error.to_string(),
        }
    }

    /// Maps a transport failure of a `query` call back onto the engine-side taxonomy.
    pub(crate) fn from_transport(sql: &str, error: TransportError) -> Self {
        match error.remote_error() {
            Some(RemoteError {
                code: ErrorCode::QueryFailed,
                message,
            }) => Self::Engine {
                sql: sql.to_string(),
                message: message.clone(),
            },
            Some(RemoteError {
                code: ErrorCode::NoTraceLoaded,
                ..
            }) => Self::NoTraceLoaded,
            _ => Self::Transport(error),
        }
    }
}

impl From<QueryError> for RemoteError {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::Engine { message, .. } => RemoteError::new(ErrorCode::QueryFailed, message),
            QueryError::NoTraceLoaded => {
                RemoteError::new(ErrorCode::NoTraceLoaded, "no trace loaded into engine")
            }
            other => RemoteError::new(ErrorCode::Internal, other.to_string()),
        }
    }
}
