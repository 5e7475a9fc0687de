//! Error types for the execution engine

use thiserror::Error;

/// Errors from the engine's own machinery. A failing plugin is not an error
/// here; it surfaces as a `WorkerResult` failure outcome.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Backing store errors, reported back to the worker as remote failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid storage value: {0}")]
    InvalidValue(String),
}

/// Gateway execution errors, reported back to the worker as remote failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown gateway: {0}")]
    UnknownGateway(String),

    #[error("gateway call failed: {0}")]
    CallFailed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::CallFailed(err.to_string())
    }
}
