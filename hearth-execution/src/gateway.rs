//! Gateway execution, supervisor side

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use tracing::debug;

use crate::error::GatewayError;

/// Performs the real integration call for a gateway on behalf of a worker.
/// Runs only in the trusted supervisor context; live credentials and
/// endpoints never reach the sandboxed side.
#[async_trait]
pub trait GatewayExecutor: Send + Sync {
    async fn execute(
        &self,
        gateway_id: &str,
        action: &str,
        params: JsonValue,
    ) -> Result<JsonValue, GatewayError>;
}

/// Webhook-backed executor: POSTs the action and params as JSON to the
/// endpoint configured for the gateway and returns the response body.
pub struct HttpGatewayExecutor {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpGatewayExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: HashMap::new(),
        }
    }

    /// Map a gateway id to its webhook endpoint
    pub fn with_endpoint(mut self, gateway_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(gateway_id.into(), url.into());
        self
    }
}

impl Default for HttpGatewayExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayExecutor for HttpGatewayExecutor {
    async fn execute(
        &self,
        gateway_id: &str,
        action: &str,
        params: JsonValue,
    ) -> Result<JsonValue, GatewayError> {
        let endpoint = self
            .endpoints
            .get(gateway_id)
            .ok_or_else(|| GatewayError::UnknownGateway(gateway_id.to_string()))?;

        debug!(gateway_id, action, endpoint = %endpoint, "executing gateway call");

        let response = self
            .client
            .post(endpoint)
            .json(&json!({
                "gateway_id": gateway_id,
                "action": action,
                "params": params,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::CallFailed(format!(
                "endpoint returned {}",
                status
            )));
        }

        Ok(response.json::<JsonValue>().await?)
    }
}
