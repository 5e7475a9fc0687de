//! Hearth plugin execution engine.
//!
//! The [`Supervisor`] runs one isolated worker per plugin execution, services
//! every side effect the worker requests against the real backing systems,
//! and converts any failure mode (load error, handler error, timeout, crash)
//! into a structured [`hearth_ipc::WorkerResult`] for the installation
//! service.

pub mod config;
pub mod error;
pub mod gateway;
pub mod runtime;
pub mod storage;
pub mod supervisor;

pub use config::ExecutorConfig;
pub use error::{ExecutionError, GatewayError, StorageError};
pub use gateway::{GatewayExecutor, HttpGatewayExecutor};
pub use runtime::{run_worker, ExecutionState};
pub use storage::{InMemoryStorage, StorageBackend};
pub use supervisor::Supervisor;
