//! Supervisor: spawns workers, services their side effects, owns deadlines

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hearth_ipc::{
    channel_pair, Envelope, Reply, ReplySender, SideEffectRequest, WorkerInput, WorkerResult,
};
use hearth_plugin::PluginLoader;

use crate::config::ExecutorConfig;
use crate::error::ExecutionError;
use crate::gateway::GatewayExecutor;
use crate::runtime::{run_worker, ExecutionState};
use crate::storage::StorageBackend;

/// Runs plugin executions: one isolated worker per execution, every side
/// effect serviced here against the real backing systems.
///
/// `execute` calls may run concurrently; each gets its own worker and
/// channel, and nothing mutable is shared between executions except the
/// backing storage and gateway systems behind their `Send + Sync` traits.
pub struct Supervisor {
    loader: Arc<dyn PluginLoader>,
    storage: Arc<dyn StorageBackend>,
    gateways: Arc<dyn GatewayExecutor>,
    config: ExecutorConfig,
    permits: Arc<Semaphore>,
}

impl Supervisor {
    pub fn new(
        loader: Arc<dyn PluginLoader>,
        storage: Arc<dyn StorageBackend>,
        gateways: Arc<dyn GatewayExecutor>,
        config: ExecutorConfig,
    ) -> Result<Self, ExecutionError> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_executions));
        Ok(Self {
            loader,
            storage,
            gateways,
            config,
            permits,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one plugin invocation with the configured overall timeout
    pub async fn execute(&self, input: WorkerInput) -> WorkerResult {
        self.execute_with_timeout(input, self.config.execution_timeout)
            .await
    }

    /// Execute one plugin invocation, returning exactly one result.
    ///
    /// Every failure mode folds into the result: a handler or load error
    /// becomes a failure outcome, the overall deadline kills the worker and
    /// synthesizes "execution timed out" with the deadline as the duration,
    /// and a worker that dies without a terminal message becomes
    /// "worker crashed". Callers never see a transport error.
    pub async fn execute_with_timeout(
        &self,
        input: WorkerInput,
        overall_timeout: Duration,
    ) -> WorkerResult {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return WorkerResult::failure("executor shut down", Utc::now()),
        };

        let execution_id = Uuid::new_v4();
        let installation_id = input.context.installation_id.clone();
        let started_at = Utc::now();
        info!(
            %execution_id,
            plugin_ref = %input.plugin_ref,
            installation_id = %installation_id,
            event_type = %input.event_type,
            "starting plugin execution"
        );

        let (mut host, worker_channel) = channel_pair(self.config.channel_capacity);
        let replies = host.reply_sender();
        let mut worker = tokio::spawn(run_worker(
            input,
            Arc::clone(&self.loader),
            worker_channel,
            self.config.proxy_call_timeout,
        ));

        let deadline = tokio::time::sleep(overall_timeout);
        tokio::pin!(deadline);
        let mut requests_open = true;

        loop {
            tokio::select! {
                joined = &mut worker => {
                    let result = match joined {
                        Ok(result) => result,
                        Err(err) => {
                            error!(%execution_id, panic = err.is_panic(), "worker died without a terminal result");
                            WorkerResult::crashed(started_at)
                        }
                    };
                    debug!(
                        %execution_id,
                        success = result.is_success(),
                        duration_ms = result.duration_ms,
                        "execution finished"
                    );
                    return result;
                }
                () = &mut deadline => {
                    warn!(
                        %execution_id,
                        state = %ExecutionState::TimedOut,
                        timeout_ms = overall_timeout.as_millis() as u64,
                        "execution exceeded overall deadline, killing worker"
                    );
                    // Hard cancel: a runaway handler must not be able to
                    // block teardown. Dropping the channel afterwards fails
                    // every still-pending proxy call.
                    worker.abort();
                    let _ = worker.await;
                    return WorkerResult::execution_timed_out(started_at, overall_timeout);
                }
                envelope = host.recv(), if requests_open => {
                    match envelope {
                        Some(envelope) => {
                            self.service_request(&installation_id, envelope, &replies).await;
                        }
                        None => requests_open = false,
                    }
                }
            }
        }
    }

    /// Service one side-effect request against the real backing systems.
    ///
    /// Storage requests run inline, so mutations for one worker are applied
    /// in arrival order and a `set` is never reordered after a later `get`
    /// on the same key. Gateway calls are spawned off the loop: a slow
    /// integration must not stall the worker's storage traffic.
    async fn service_request(
        &self,
        installation_id: &str,
        envelope: Envelope,
        replies: &ReplySender,
    ) {
        match envelope.request {
            SideEffectRequest::StorageGet { key } => {
                let reply = match self.storage.get(installation_id, &key).await {
                    Ok(value) => Reply::ok(envelope.id, value),
                    Err(err) => Reply::err(envelope.id, err.to_string()),
                };
                self.deliver(replies, reply).await;
            }
            SideEffectRequest::StorageSet { key, value, ttl_ms } => {
                let ttl = ttl_ms.map(Duration::from_millis);
                let reply = match self.storage.set(installation_id, &key, value, ttl).await {
                    Ok(()) => Reply::ok(envelope.id, None),
                    Err(err) => Reply::err(envelope.id, err.to_string()),
                };
                self.deliver(replies, reply).await;
            }
            SideEffectRequest::StorageDelete { key } => {
                let reply = match self.storage.delete(installation_id, &key).await {
                    Ok(()) => Reply::ok(envelope.id, None),
                    Err(err) => Reply::err(envelope.id, err.to_string()),
                };
                self.deliver(replies, reply).await;
            }
            SideEffectRequest::GatewayExecute {
                gateway_id,
                action,
                params,
            } => {
                let gateways = Arc::clone(&self.gateways);
                let replies = replies.clone();
                let id = envelope.id;
                tokio::spawn(async move {
                    let reply = match gateways.execute(&gateway_id, &action, params).await {
                        Ok(value) => Reply::ok(id, Some(value)),
                        Err(err) => Reply::err(id, err.to_string()),
                    };
                    // The worker may be gone by the time a slow call returns
                    let _ = replies.send(reply).await;
                });
            }
        }
    }

    async fn deliver(&self, replies: &ReplySender, reply: Reply) {
        if replies.send(reply).await.is_err() {
            debug!("worker went away before the reply could be delivered");
        }
    }
}
