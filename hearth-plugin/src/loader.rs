//! Plugin loading strategies

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::EventHandler;
use crate::error::LoadError;

/// Reference prefix claimed by the external loading strategy
pub const EXTERNAL_REF_PREFIX: &str = "external:";

/// Resolves an opaque plugin reference into an executable handler.
///
/// Injectable strategy: a real isolation backend (a WASM runtime, a
/// capability-restricted subprocess) can replace or extend the builtin
/// registry without touching the supervisor or the worker runtime.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    /// Resolve `plugin_ref` to a handler
    async fn load(&self, plugin_ref: &str) -> Result<Arc<dyn EventHandler>, LoadError>;

    /// Whether this loader claims the given reference
    fn can_load(&self, plugin_ref: &str) -> bool;

    /// Loader name/type
    fn loader_type(&self) -> &'static str;
}

/// Statically registered, trusted handlers compiled into the host.
/// No dynamic code execution.
pub struct BuiltinPluginLoader {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl BuiltinPluginLoader {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry preloaded with the stock builtin plugins
    pub fn with_defaults() -> Self {
        let mut loader = Self::new();
        loader.register("echo", Arc::new(crate::builtins::EchoPlugin));
        loader.register("counter", Arc::new(crate::builtins::CounterPlugin));
        loader.register("forward", Arc::new(crate::builtins::ForwardPlugin));
        loader
    }

    /// Register a handler under `name`, replacing any previous registration
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(name.into(), handler);
    }
}

impl Default for BuiltinPluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginLoader for BuiltinPluginLoader {
    async fn load(&self, plugin_ref: &str) -> Result<Arc<dyn EventHandler>, LoadError> {
        match self.handlers.get(plugin_ref) {
            Some(handler) => {
                debug!(plugin_ref, loader = "builtin", "resolved plugin handler");
                Ok(Arc::clone(handler))
            }
            None => Err(LoadError::NotFound {
                name: plugin_ref.to_string(),
            }),
        }
    }

    fn can_load(&self, plugin_ref: &str) -> bool {
        self.handlers.contains_key(plugin_ref)
    }

    fn loader_type(&self) -> &'static str {
        "builtin"
    }
}

/// Extension point for externally supplied plugin code.
///
/// External plugins require a memory/CPU-limited sandbox with no ambient
/// filesystem or network access. Until such a backend is configured, every
/// `external:` reference fails with [`LoadError::Unsupported`].
pub struct ExternalPluginLoader;

#[async_trait]
impl PluginLoader for ExternalPluginLoader {
    async fn load(&self, plugin_ref: &str) -> Result<Arc<dyn EventHandler>, LoadError> {
        debug!(plugin_ref, loader = "external", "rejecting external plugin reference");
        Err(LoadError::Unsupported {
            reason: "no sandbox backend configured for external plugins".to_string(),
        })
    }

    fn can_load(&self, plugin_ref: &str) -> bool {
        plugin_ref.starts_with(EXTERNAL_REF_PREFIX)
    }

    fn loader_type(&self) -> &'static str {
        "external"
    }
}

/// Tries loaders in registration order; the first one claiming the reference
/// wins and its result is returned as-is, so an `Unsupported` failure is not
/// masked as `NotFound`.
pub struct CompositePluginLoader {
    loaders: Vec<Box<dyn PluginLoader>>,
}

impl CompositePluginLoader {
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    pub fn add_loader(&mut self, loader: Box<dyn PluginLoader>) {
        self.loaders.push(loader);
    }

    /// Builtin registry with stock plugins, plus the external placeholder
    pub fn with_defaults() -> Self {
        let mut loader = Self::new();
        loader.add_loader(Box::new(BuiltinPluginLoader::with_defaults()));
        loader.add_loader(Box::new(ExternalPluginLoader));
        loader
    }
}

impl Default for CompositePluginLoader {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl PluginLoader for CompositePluginLoader {
    async fn load(&self, plugin_ref: &str) -> Result<Arc<dyn EventHandler>, LoadError> {
        for loader in &self.loaders {
            if loader.can_load(plugin_ref) {
                return loader.load(plugin_ref).await;
            }
        }

        Err(LoadError::NotFound {
            name: plugin_ref.to_string(),
        })
    }

    fn can_load(&self, plugin_ref: &str) -> bool {
        self.loaders.iter().any(|loader| loader.can_load(plugin_ref))
    }

    fn loader_type(&self) -> &'static str {
        "composite"
    }
}
