//! Counter plugin

use async_trait::async_trait;
use serde_json::json;

use crate::core::{Event, EventHandler, PluginContext, PluginOutput};
use crate::error::HandlerError;

/// Keeps a persistent per-event-type counter in installation storage and
/// returns the running count.
pub struct CounterPlugin;

#[async_trait]
impl EventHandler for CounterPlugin {
    async fn on_event(
        &self,
        event: Event,
        ctx: &PluginContext,
    ) -> Result<PluginOutput, HandlerError> {
        let key = format!("events.{}", event.event_type);
        let count = ctx.storage.increment(&key, 1).await?;

        Ok(PluginOutput::new(json!({
            "event_type": event.event_type,
            "count": count,
        })))
    }
}
