//! Core handler trait and context definitions

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hearth_ipc::{ExecutionContext, WorkerChannel};

use crate::error::HandlerError;
use crate::proxy::{GatewayProxy, StorageProxy};

/// Platform event that triggered the execution
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: JsonValue,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// Successful handler output plus optional usage telemetry for billing
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOutput {
    pub output: JsonValue,
    pub tokens_used: Option<u64>,
    pub api_calls: Option<u64>,
}

impl PluginOutput {
    pub fn new(output: JsonValue) -> Self {
        Self {
            output,
            tokens_used: None,
            api_calls: None,
        }
    }

    pub fn with_tokens_used(mut self, tokens_used: u64) -> Self {
        self.tokens_used = Some(tokens_used);
        self
    }

    pub fn with_api_calls(mut self, api_calls: u64) -> Self {
        self.api_calls = Some(api_calls);
        self
    }
}

/// The single entry point of a plugin.
///
/// Handlers suspend whenever a proxy call performs a round trip; pure local
/// calls (gateway lookups, config reads) never suspend.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, event: Event, ctx: &PluginContext)
        -> Result<PluginOutput, HandlerError>;
}

impl std::fmt::Debug for dyn EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventHandler")
    }
}

/// What a handler sees for the duration of one `on_event` call: identity and
/// configuration from the execution input, plus the side-effect proxies.
pub struct PluginContext {
    pub storage: StorageProxy,
    pub gateways: GatewayProxy,
    pub tenant_id: String,
    pub organization_id: Option<String>,
    pub installation_id: String,
    pub config: HashMap<String, JsonValue>,
}

impl PluginContext {
    /// Build the handler-facing context from the execution context and the
    /// worker's channel. `call_timeout` bounds each proxy round trip,
    /// independently of the overall execution deadline.
    pub fn new(
        context: ExecutionContext,
        channel: Arc<WorkerChannel>,
        call_timeout: Duration,
    ) -> Self {
        let storage = StorageProxy::new(Arc::clone(&channel), call_timeout);
        let gateways = GatewayProxy::new(channel, context.gateways, call_timeout);
        Self {
            storage,
            gateways,
            tenant_id: context.tenant_id,
            organization_id: context.organization_id,
            installation_id: context.installation_id,
            config: context.config,
        }
    }

    /// Configuration value for `key`, if the installation provides one
    pub fn config_value(&self, key: &str) -> Option<&JsonValue> {
        self.config.get(key)
    }
}
