//! Plugin system error types

use hearth_ipc::ChannelError;
use thiserror::Error;

/// Errors resolving a plugin reference. Fatal to the execution: the worker
/// short-circuits before the handler ever runs.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("plugin '{name}' not found")]
    NotFound { name: String },

    #[error("plugin reference not loadable: {reason}")]
    Unsupported { reason: String },
}

/// Errors returned by a plugin handler
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    /// A side-effect call failed. Handlers may catch recoverable channel
    /// errors instead of propagating them.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
