use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownMethod,
    InvalidArguments,
    NotInitialized,
    AlreadyInitialized,
    QueryFailed,
    NoTraceLoaded,
    Internal,
}

/// Failure reported by the far side of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct RemoteError {
    pub code: ErrorCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(ErrorCode::UnknownMethod, format!("no method named `{method}`"))
    }

    pub fn invalid_arguments(method: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidArguments,
            format!("invalid arguments for `{method}`: {detail}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}
