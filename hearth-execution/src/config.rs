//! Execution engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ExecutionError;

/// Configuration for the supervisor and its workers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Hard deadline for one plugin execution, end to end
    #[serde(with = "serde_duration", default = "default_execution_timeout")]
    pub execution_timeout: Duration,

    /// Deadline for a single side-effect round trip, distinct from the
    /// overall execution deadline
    #[serde(with = "serde_duration", default = "default_proxy_call_timeout")]
    pub proxy_call_timeout: Duration,

    /// Buffered envelopes per direction on one worker channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Concurrent executions admitted before callers queue
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            execution_timeout: default_execution_timeout(),
            proxy_call_timeout: default_proxy_call_timeout(),
            channel_capacity: default_channel_capacity(),
            max_concurrent_executions: default_max_concurrent_executions(),
        }
    }
}

impl ExecutorConfig {
    /// Short deadlines for tests
    pub fn for_testing() -> Self {
        Self {
            execution_timeout: Duration::from_secs(2),
            proxy_call_timeout: Duration::from_millis(200),
            channel_capacity: 8,
            max_concurrent_executions: 2,
        }
    }

    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.execution_timeout.is_zero() {
            return Err(ExecutionError::Configuration(
                "execution_timeout must be positive".to_string(),
            ));
        }
        if self.proxy_call_timeout.is_zero() {
            return Err(ExecutionError::Configuration(
                "proxy_call_timeout must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ExecutionError::Configuration(
                "channel_capacity must be positive".to_string(),
            ));
        }
        if self.max_concurrent_executions == 0 {
            return Err(ExecutionError::Configuration(
                "max_concurrent_executions must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde helper module for Duration serialization as seconds
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

fn default_execution_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_proxy_call_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_channel_capacity() -> usize {
    64
}

fn default_max_concurrent_executions() -> usize {
    num_cpus::get()
}
