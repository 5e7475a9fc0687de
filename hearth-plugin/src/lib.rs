//! Plugin API surface for the Hearth sandbox.
//!
//! Plugins implement [`EventHandler`] and are resolved by a [`PluginLoader`]
//! strategy. Inside the worker, a handler sees a [`PluginContext`]: a
//! read-only view over the execution input plus two proxies that mediate
//! every side effect through the supervisor channel.

pub mod builtins;
pub mod core;
pub mod error;
pub mod loader;
pub mod proxy;

pub use crate::core::{Event, EventHandler, PluginContext, PluginOutput};
pub use crate::error::{HandlerError, LoadError};
pub use crate::loader::{
    BuiltinPluginLoader, CompositePluginLoader, ExternalPluginLoader, PluginLoader,
};
pub use crate::proxy::{GatewayProxy, StorageProxy};
