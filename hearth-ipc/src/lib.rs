//! Messaging layer between the sandbox supervisor and its worker instances.
//!
//! Each plugin execution gets its own channel pair: the worker side turns
//! side-effect calls into correlated [`protocol::Envelope`]s and suspends
//! until the matching [`protocol::Reply`] arrives, while the host side
//! services requests against the real backing systems. Correlation state is
//! owned by the channel instance, so concurrent executions share nothing.

pub mod channel;
pub mod error;
pub mod protocol;

pub use channel::{channel_pair, HostChannel, ReplySender, WorkerChannel};
pub use error::ChannelError;
pub use protocol::{
    Envelope, ExecutionContext, ExecutionOutcome, GatewayHandle, Reply, ReplyPayload,
    SideEffectRequest, WorkerInput, WorkerResult, PROTOCOL_VERSION,
};
