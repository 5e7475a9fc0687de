//! Correlated request/reply channel scoped to one supervisor/worker pair

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, trace};

use crate::error::ChannelError;
use crate::protocol::{Envelope, Reply, ReplyPayload, SideEffectRequest};

type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<ReplyPayload>>>>;

/// Create a connected channel pair for one execution. Correlation state is
/// owned by this pair; ids are unique within it only.
pub fn channel_pair(capacity: usize) -> (HostChannel, WorkerChannel) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (reply_tx, reply_rx) = mpsc::channel(capacity);

    let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let pump = tokio::spawn(reply_pump(
        reply_rx,
        Arc::clone(&pending),
        Arc::clone(&closed),
    ));

    (
        HostChannel {
            requests: request_rx,
            replies: reply_tx,
        },
        WorkerChannel {
            requests: request_tx,
            pending,
            next_id: AtomicU64::new(0),
            closed,
            pump,
        },
    )
}

/// Routes each inbound reply to the pending call with the matching id.
/// When the host end closes, every outstanding call is failed immediately
/// instead of waiting out its own deadline.
async fn reply_pump(mut replies: mpsc::Receiver<Reply>, pending: PendingTable, closed: Arc<AtomicBool>) {
    while let Some(reply) = replies.recv().await {
        let sender = pending.lock().await.remove(&reply.id);
        match sender {
            Some(tx) => {
                let _ = tx.send(reply.payload);
            }
            // Already timed out, or a duplicate. Dropped by contract.
            None => trace!(id = reply.id, "dropping reply with no pending call"),
        }
    }

    closed.store(true, Ordering::SeqCst);
    let mut pending = pending.lock().await;
    if !pending.is_empty() {
        debug!(
            outstanding = pending.len(),
            "channel closed with outstanding calls"
        );
    }
    // Dropping the senders resolves every waiter with ChannelError::Closed
    pending.clear();
}

/// Worker-side endpoint. Side-effect proxies call [`WorkerChannel::request`]
/// and suspend until the correlated reply or the deadline, whichever first.
pub struct WorkerChannel {
    requests: mpsc::Sender<Envelope>,
    pending: PendingTable,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    pump: tokio::task::JoinHandle<()>,
}

impl WorkerChannel {
    /// Send one side-effect request and await its reply.
    ///
    /// A timeout resolves this call only; the channel stays usable and the
    /// handler decides whether to propagate or swallow the error.
    pub async fn request(
        &self,
        request: SideEffectRequest,
        timeout: Duration,
    ) -> Result<Option<JsonValue>, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        let kind = request.kind();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, reply_tx);

        if self.requests.send(Envelope::new(id, request)).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ChannelError::Closed);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(ReplyPayload::Ok { value })) => Ok(value),
            Ok(Ok(ReplyPayload::Err { message })) => Err(ChannelError::Remote(message)),
            // Pending entry was drained by the pump: the host is gone
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                let timeout_ms = timeout.as_millis() as u64;
                debug!(id, kind, timeout_ms, "side-effect request timed out");
                Err(ChannelError::Timeout { kind, timeout_ms })
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Host-side endpoint: a stream of inbound envelopes plus a reply path
pub struct HostChannel {
    requests: mpsc::Receiver<Envelope>,
    replies: mpsc::Sender<Reply>,
}

impl HostChannel {
    /// Receive the next envelope, in send order. `None` once the worker side
    /// is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.requests.recv().await
    }

    pub async fn reply(&self, reply: Reply) -> Result<(), ChannelError> {
        self.replies
            .send(reply)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Clone of the reply path, for requests serviced off the main loop
    pub fn reply_sender(&self) -> ReplySender {
        ReplySender {
            inner: self.replies.clone(),
        }
    }
}

/// Cloneable handle for sending replies from spawned service tasks
#[derive(Clone)]
pub struct ReplySender {
    inner: mpsc::Sender<Reply>,
}

impl ReplySender {
    pub async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        self.inner
            .send(reply)
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;

    fn get_request(key: &str) -> SideEffectRequest {
        SideEffectRequest::StorageGet {
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_request_reply_round_trip() {
        let (mut host, worker) = channel_pair(8);

        let service = tokio::spawn(async move {
            let envelope = host.recv().await.expect("one request");
            assert_eq!(envelope.request.kind(), "storage.get");
            host.reply(Reply::ok(envelope.id, Some(json!("stored"))))
                .await
                .unwrap();
            host
        });

        let value = worker
            .request(get_request("greeting"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, Some(json!("stored")));

        service.await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_error_is_recoverable() {
        let (mut host, worker) = channel_pair(8);

        tokio::spawn(async move {
            let envelope = host.recv().await.expect("one request");
            host.reply(Reply::err(envelope.id, "backing store unavailable"))
                .await
                .unwrap();
        });

        let err = worker
            .request(get_request("greeting"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Remote(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_timeout_then_late_reply_is_dropped() {
        let (mut host, worker) = channel_pair(8);

        let err = worker
            .request(get_request("slow"), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Timeout { kind: "storage.get", .. }));

        // Reply after the deadline: must be dropped without disturbing the
        // next call on the same channel.
        let envelope = host.recv().await.expect("timed-out request");
        host.reply(Reply::ok(envelope.id, Some(json!("late"))))
            .await
            .unwrap();

        let service = tokio::spawn(async move {
            let envelope = host.recv().await.expect("second request");
            host.reply(Reply::ok(envelope.id, Some(json!("fresh"))))
                .await
                .unwrap();
            host
        });

        let value = worker
            .request(get_request("fast"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, Some(json!("fresh")));

        service.await.unwrap();
    }

    #[tokio::test]
    async fn test_host_drop_fails_pending_call_immediately() {
        let (host, worker) = channel_pair(8);

        let waiter = tokio::spawn(async move {
            let started = Instant::now();
            let err = worker
                .request(get_request("orphaned"), Duration::from_secs(30))
                .await
                .unwrap_err();
            (err, started.elapsed())
        });

        // Give the request time to land in the pending table, then tear the
        // host end down with the call still outstanding.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(host);

        let (err, elapsed) = waiter.await.unwrap();
        assert!(matches!(err, ChannelError::Closed));
        assert!(elapsed < Duration::from_secs(5), "did not wait out the deadline");
    }

    #[tokio::test]
    async fn test_requests_after_close_fail_fast() {
        let (host, worker) = channel_pair(8);
        drop(host);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = worker
            .request(get_request("any"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Closed));
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_within_a_channel() {
        let (mut host, worker) = channel_pair(8);

        let service = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..3 {
                let envelope = host.recv().await.expect("request");
                seen.push(envelope.id);
                host.reply(Reply::ok(envelope.id, None)).await.unwrap();
            }
            seen
        });

        for _ in 0..3 {
            worker
                .request(get_request("k"), Duration::from_secs(1))
                .await
                .unwrap();
        }

        let seen = service.await.unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
