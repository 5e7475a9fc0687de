//! Builtin plugins shipped with the platform.
//!
//! Each is a trusted, statically linked [`crate::EventHandler`] registered by
//! [`crate::BuiltinPluginLoader::with_defaults`].

mod counter;
mod echo;
mod forward;

pub use counter::CounterPlugin;
pub use echo::EchoPlugin;
pub use forward::ForwardPlugin;
