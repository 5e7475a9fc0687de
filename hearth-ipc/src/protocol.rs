//! Protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// A gateway the plugin may invoke indirectly, already authorized for the
/// tenant by the caller. The sandbox performs no authorization of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayHandle {
    pub id: String,
    pub name: String,
    pub kind: String,
}

impl GatewayHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Tenant-scoped context shipped to the worker as part of its input.
/// Immutable for the lifetime of the execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub tenant_id: String,
    pub organization_id: Option<String>,
    pub installation_id: String,
    /// Plugin configuration, opaque to the sandbox
    #[serde(default)]
    pub config: HashMap<String, JsonValue>,
    /// Gateway handles resolved by the caller, in caller order
    #[serde(default)]
    pub gateways: Vec<GatewayHandle>,
}

impl ExecutionContext {
    /// Create a context for one installation of a plugin
    pub fn new(tenant_id: impl Into<String>, installation_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            organization_id: None,
            installation_id: installation_id.into(),
            config: HashMap::new(),
            gateways: Vec::new(),
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_config_value(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayHandle) -> Self {
        self.gateways.push(gateway);
        self
    }
}

/// One-shot input handed to a worker. Created once per execution by the
/// supervisor and never mutated after handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInput {
    /// Opaque plugin reference, resolvable by the configured loader
    pub plugin_ref: String,
    pub event_type: String,
    pub event_data: JsonValue,
    pub context: ExecutionContext,
}

impl WorkerInput {
    pub fn new(
        plugin_ref: impl Into<String>,
        event_type: impl Into<String>,
        event_data: JsonValue,
        context: ExecutionContext,
    ) -> Self {
        Self {
            plugin_ref: plugin_ref.into(),
            event_type: event_type.into(),
            event_data,
            context,
        }
    }
}

/// Terminal outcome of one plugin execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success {
        output: JsonValue,
        tokens_used: Option<u64>,
        api_calls: Option<u64>,
    },
    Failure {
        error_message: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

/// Result of one plugin execution, produced exactly once per worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub outcome: ExecutionOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// End-to-end latency from input receipt to outcome finalization,
    /// including channel round trips. Billed and reported upstream.
    pub duration_ms: u64,
}

impl WorkerResult {
    /// Create a successful result, stamping completion at the current time
    pub fn success(
        output: JsonValue,
        tokens_used: Option<u64>,
        api_calls: Option<u64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            outcome: ExecutionOutcome::Success {
                output,
                tokens_used,
                api_calls,
            },
            started_at,
            completed_at,
            duration_ms: elapsed_ms(started_at, completed_at),
        }
    }

    /// Create a failed result, stamping completion at the current time
    pub fn failure(error_message: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        Self {
            outcome: ExecutionOutcome::Failure {
                error_message: error_message.into(),
            },
            started_at,
            completed_at,
            duration_ms: elapsed_ms(started_at, completed_at),
        }
    }

    /// Synthesize the result of an execution cut off at the overall deadline.
    /// The reported duration is the deadline itself.
    pub fn execution_timed_out(started_at: DateTime<Utc>, overall_timeout: Duration) -> Self {
        let duration_ms = overall_timeout.as_millis() as u64;
        Self {
            outcome: ExecutionOutcome::Failure {
                error_message: "execution timed out".to_string(),
            },
            started_at,
            completed_at: started_at + chrono::Duration::milliseconds(duration_ms as i64),
            duration_ms,
        }
    }

    /// Synthesize the result of a worker that died without a terminal message
    pub fn crashed(started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        Self {
            outcome: ExecutionOutcome::Failure {
                error_message: "worker crashed".to_string(),
            },
            started_at,
            completed_at,
            duration_ms: elapsed_ms(started_at, completed_at),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Failure { error_message } => Some(error_message),
            ExecutionOutcome::Success { .. } => None,
        }
    }
}

fn elapsed_ms(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> u64 {
    (completed_at - started_at).num_milliseconds().max(0) as u64
}

/// A side-effecting operation requested by the worker. The real operation
/// runs on the supervisor side, which is the only place with access to the
/// backing systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffectRequest {
    StorageGet {
        key: String,
    },
    StorageSet {
        key: String,
        value: JsonValue,
        ttl_ms: Option<u64>,
    },
    StorageDelete {
        key: String,
    },
    GatewayExecute {
        gateway_id: String,
        action: String,
        params: JsonValue,
    },
}

impl SideEffectRequest {
    /// Stable request kind name, used in timeout errors and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffectRequest::StorageGet { .. } => "storage.get",
            SideEffectRequest::StorageSet { .. } => "storage.set",
            SideEffectRequest::StorageDelete { .. } => "storage.delete",
            SideEffectRequest::GatewayExecute { .. } => "gateway.execute",
        }
    }
}

/// Correlated message carrying one side-effect request worker to host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique within one channel instance, monotonically assigned
    pub id: u64,
    pub protocol_version: u32,
    pub request: SideEffectRequest,
}

impl Envelope {
    pub fn new(id: u64, request: SideEffectRequest) -> Self {
        Self {
            id,
            protocol_version: PROTOCOL_VERSION,
            request,
        }
    }
}

/// Host response to one envelope. Every envelope id receives at most one reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    pub payload: ReplyPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyPayload {
    Ok { value: Option<JsonValue> },
    Err { message: String },
}

impl Reply {
    pub fn ok(id: u64, value: Option<JsonValue>) -> Self {
        Self {
            id,
            payload: ReplyPayload::Ok { value },
        }
    }

    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            payload: ReplyPayload::Err {
                message: message.into(),
            },
        }
    }
}
