//! Worker runtime: the isolated side of one plugin execution

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use hearth_ipc::{WorkerChannel, WorkerInput, WorkerResult};
use hearth_plugin::{Event, PluginContext, PluginLoader};

/// Lifecycle of one worker. `TimedOut` is driven externally by the
/// supervisor; the runtime itself only reaches the other terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Loading,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Loading => "loading",
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
            ExecutionState::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Run one plugin execution to completion inside the worker task.
///
/// One-shot by design: exactly one [`WorkerResult`] is produced and the task
/// exits. Workers are never reused across executions. The reported duration
/// spans input receipt to outcome finalization, channel round trips
/// included.
pub async fn run_worker(
    input: WorkerInput,
    loader: Arc<dyn PluginLoader>,
    channel: WorkerChannel,
    call_timeout: Duration,
) -> WorkerResult {
    let started_at = Utc::now();
    let mut state = ExecutionState::Loading;
    debug!(
        plugin_ref = %input.plugin_ref,
        event_type = %input.event_type,
        %state,
        "worker received input"
    );

    // Loading -> Failed short-circuits: an unresolvable ref never reaches Running
    let handler = match loader.load(&input.plugin_ref).await {
        Ok(handler) => handler,
        Err(err) => {
            state = ExecutionState::Failed;
            warn!(plugin_ref = %input.plugin_ref, %state, error = %err, "plugin load failed");
            return WorkerResult::failure(err.to_string(), started_at);
        }
    };

    state = ExecutionState::Running;
    debug!(plugin_ref = %input.plugin_ref, %state, "invoking handler");

    let event = Event::new(input.event_type, input.event_data);
    let ctx = PluginContext::new(input.context, Arc::new(channel), call_timeout);

    match handler.on_event(event, &ctx).await {
        Ok(output) => {
            state = ExecutionState::Completed;
            debug!(%state, "handler returned");
            WorkerResult::success(output.output, output.tokens_used, output.api_calls, started_at)
        }
        Err(err) => {
            state = ExecutionState::Failed;
            debug!(%state, error = %err, "handler failed");
            WorkerResult::failure(err.to_string(), started_at)
        }
    }
}
