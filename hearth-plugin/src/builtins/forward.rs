//! Forward plugin

use async_trait::async_trait;
use serde_json::json;

use crate::core::{Event, EventHandler, PluginContext, PluginOutput};
use crate::error::HandlerError;

const DEFAULT_GATEWAY_KIND: &str = "webhook";

/// Relays the event through a gateway of the configured kind
/// (`gateway_kind` in the installation config, "webhook" by default).
pub struct ForwardPlugin;

#[async_trait]
impl EventHandler for ForwardPlugin {
    async fn on_event(
        &self,
        event: Event,
        ctx: &PluginContext,
    ) -> Result<PluginOutput, HandlerError> {
        let kind = ctx
            .config_value("gateway_kind")
            .and_then(|value| value.as_str())
            .unwrap_or(DEFAULT_GATEWAY_KIND);

        let gateway_id = ctx
            .gateways
            .get_by_kind(kind)
            .map(|gateway| gateway.id.clone())
            .ok_or_else(|| {
                HandlerError::failed(format!("no gateway of kind '{}' configured", kind))
            })?;

        let response = ctx
            .gateways
            .execute(
                &gateway_id,
                "forward_event",
                json!({
                    "event_type": event.event_type,
                    "data": event.data,
                }),
            )
            .await?;

        Ok(PluginOutput::new(json!({
            "forwarded_to": gateway_id,
            "response": response,
        }))
        .with_api_calls(1))
    }
}
