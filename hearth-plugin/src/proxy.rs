//! Worker-side facades that turn side-effect calls into channel round trips

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;

use hearth_ipc::{ChannelError, GatewayHandle, SideEffectRequest, WorkerChannel};

/// Persistent key/value storage scoped to the installation. Every method
/// here is one or more correlated round trips to the supervisor, which owns
/// the real store.
pub struct StorageProxy {
    channel: Arc<WorkerChannel>,
    call_timeout: Duration,
}

impl StorageProxy {
    pub(crate) fn new(channel: Arc<WorkerChannel>, call_timeout: Duration) -> Self {
        Self {
            channel,
            call_timeout,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<JsonValue>, ChannelError> {
        self.channel
            .request(
                SideEffectRequest::StorageGet {
                    key: key.to_string(),
                },
                self.call_timeout,
            )
            .await
    }

    pub async fn set(
        &self,
        key: &str,
        value: JsonValue,
        ttl: Option<Duration>,
    ) -> Result<(), ChannelError> {
        self.channel
            .request(
                SideEffectRequest::StorageSet {
                    key: key.to_string(),
                    value,
                    ttl_ms: ttl.map(|ttl| ttl.as_millis() as u64),
                },
                self.call_timeout,
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ChannelError> {
        self.channel
            .request(
                SideEffectRequest::StorageDelete {
                    key: key.to_string(),
                },
                self.call_timeout,
            )
            .await?;
        Ok(())
    }

    /// `get` plus a presence check; no dedicated wire verb
    pub async fn has(&self, key: &str) -> Result<bool, ChannelError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Read-modify-write over two round trips. The new value is computed
    /// client-side, so concurrent executions of the same installation can
    /// interleave between the read and the write and lose updates.
    pub async fn increment(&self, key: &str, by: i64) -> Result<i64, ChannelError> {
        let current = self
            .get(key)
            .await?
            .and_then(|value| value.as_i64())
            .unwrap_or(0);
        let next = current + by;
        self.set(key, JsonValue::from(next), None).await?;
        Ok(next)
    }
}

/// Gateway access for the handler. Lookups are pure reads over the immutable
/// handle list shipped in the execution input; only `execute` crosses the
/// channel, so the real integration call runs in the trusted supervisor
/// process and never inside the worker.
pub struct GatewayProxy {
    channel: Arc<WorkerChannel>,
    handles: Vec<GatewayHandle>,
    call_timeout: Duration,
}

impl GatewayProxy {
    pub(crate) fn new(
        channel: Arc<WorkerChannel>,
        handles: Vec<GatewayHandle>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            handles,
            call_timeout,
        }
    }

    /// All handles resolved for this installation, in caller order
    pub fn list(&self) -> &[GatewayHandle] {
        &self.handles
    }

    pub fn get_by_id(&self, id: &str) -> Option<&GatewayHandle> {
        self.handles.iter().find(|handle| handle.id == id)
    }

    /// First handle of the given kind, if any
    pub fn get_by_kind(&self, kind: &str) -> Option<&GatewayHandle> {
        self.handles.iter().find(|handle| handle.kind == kind)
    }

    pub async fn execute(
        &self,
        gateway_id: &str,
        action: &str,
        params: JsonValue,
    ) -> Result<JsonValue, ChannelError> {
        let value = self
            .channel
            .request(
                SideEffectRequest::GatewayExecute {
                    gateway_id: gateway_id.to_string(),
                    action: action.to_string(),
                    params,
                },
                self.call_timeout,
            )
            .await?;
        Ok(value.unwrap_or(JsonValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_ipc::{channel_pair, HostChannel, Reply};
    use serde_json::json;
    use std::collections::HashMap;

    // Minimal host loop backed by a plain map, counting serviced envelopes
    async fn serve_storage(mut host: HostChannel) -> usize {
        let mut store: HashMap<String, JsonValue> = HashMap::new();
        let mut serviced = 0;
        while let Some(envelope) = host.recv().await {
            serviced += 1;
            let reply = match envelope.request {
                SideEffectRequest::StorageGet { key } => {
                    Reply::ok(envelope.id, store.get(&key).cloned())
                }
                SideEffectRequest::StorageSet { key, value, .. } => {
                    store.insert(key, value);
                    Reply::ok(envelope.id, None)
                }
                SideEffectRequest::StorageDelete { key } => {
                    store.remove(&key);
                    Reply::ok(envelope.id, None)
                }
                SideEffectRequest::GatewayExecute { action, .. } => {
                    Reply::ok(envelope.id, Some(json!({ "action": action, "ok": true })))
                }
            };
            if host.reply(reply).await.is_err() {
                break;
            }
        }
        serviced
    }

    fn proxy_pair() -> (StorageProxy, GatewayProxy, tokio::task::JoinHandle<usize>) {
        let (host, worker) = channel_pair(8);
        let service = tokio::spawn(serve_storage(host));
        let channel = Arc::new(worker);
        let handles = vec![
            GatewayHandle::new("gw-1", "Primary Webhook", "webhook"),
            GatewayHandle::new("gw-2", "Chat Relay", "chat"),
        ];
        (
            StorageProxy::new(Arc::clone(&channel), Duration::from_secs(1)),
            GatewayProxy::new(channel, handles, Duration::from_secs(1)),
            service,
        )
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none_not_error() {
        let (storage, _gateways, _service) = proxy_pair();
        let value = storage.get("never-set").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let (storage, _gateways, _service) = proxy_pair();
        storage.set("x", json!(5), None).await.unwrap();
        assert_eq!(storage.get("x").await.unwrap(), Some(json!(5)));
        assert!(storage.has("x").await.unwrap());

        storage.delete("x").await.unwrap();
        assert!(!storage.has("x").await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_is_two_round_trips() {
        let (storage, gateways, service) = proxy_pair();

        assert_eq!(storage.increment("hits", 1).await.unwrap(), 1);
        assert_eq!(storage.increment("hits", 2).await.unwrap(), 3);

        drop(storage);
        drop(gateways);
        // Each increment is a get followed by a set; the window between the
        // two is where concurrent executions can lose updates.
        assert_eq!(service.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_gateway_lookups_are_local_and_stable() {
        let (_storage, gateways, service) = proxy_pair();

        assert_eq!(gateways.list().len(), 2);
        assert_eq!(gateways.list(), gateways.list());
        assert_eq!(gateways.get_by_id("gw-2").map(|h| h.kind.as_str()), Some("chat"));
        assert_eq!(
            gateways.get_by_kind("webhook").map(|h| h.id.as_str()),
            Some("gw-1")
        );
        assert!(gateways.get_by_kind("email").is_none());

        drop(_storage);
        drop(gateways);
        // Lookups never touched the channel
        assert_eq!(service.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gateway_execute_crosses_the_channel() {
        let (_storage, gateways, _service) = proxy_pair();
        let response = gateways
            .execute("gw-1", "send_message", json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(response, json!({ "action": "send_message", "ok": true }));
    }
}
