//! Channel error types

use thiserror::Error;

/// Errors surfaced to a worker from one side-effect call
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No reply arrived within the per-call deadline. The pending call is
    /// removed; a late reply is dropped silently.
    #[error("{kind} request timed out after {timeout_ms}ms")]
    Timeout { kind: &'static str, timeout_ms: u64 },

    /// The host performed the operation and it failed
    #[error("remote operation failed: {0}")]
    Remote(String),

    /// The other end of the channel is gone
    #[error("channel closed")]
    Closed,
}

impl ChannelError {
    /// Whether the plugin handler can reasonably continue after this error.
    /// Timeouts and remote failures are local to one call; a closed channel
    /// means the execution is being torn down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChannelError::Timeout { .. } | ChannelError::Remote(_))
    }
}
