use engine::QueryError;
use remote::TransportError;
use shared::{
    domain::EngineId,
    error::{ErrorCode, RemoteError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no frontend channel attached; init must be called first")]
    NotInitialized,
    #[error("controller is already initialized")]
    AlreadyInitialized,
    #[error("engine {0:?} is not registered")]
    UnknownEngine(EngineId),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<ControllerError> for RemoteError {
    fn from(value: ControllerError) -> Self {
        let code = match &value {
            ControllerError::NotInitialized => ErrorCode::NotInitialized,
            ControllerError::AlreadyInitialized => ErrorCode::AlreadyInitialized,
            ControllerError::Query(QueryError::Engine { .. }) => ErrorCode::QueryFailed,
            ControllerError::Query(QueryError::NoTraceLoaded) => ErrorCode::NoTraceLoaded,
            _ => ErrorCode::Internal,
        };
        RemoteError::new(code, value.to_string())
    }
}
