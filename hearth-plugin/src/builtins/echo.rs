//! Echo plugin

use async_trait::async_trait;
use serde_json::json;

use crate::core::{Event, EventHandler, PluginContext, PluginOutput};
use crate::error::HandlerError;

/// Replies with the triggering event unchanged. The smallest possible
/// handler; installed for wiring checks.
pub struct EchoPlugin;

#[async_trait]
impl EventHandler for EchoPlugin {
    async fn on_event(
        &self,
        event: Event,
        _ctx: &PluginContext,
    ) -> Result<PluginOutput, HandlerError> {
        Ok(PluginOutput::new(json!({
            "event_type": event.event_type,
            "echo": event.data,
        })))
    }
}
