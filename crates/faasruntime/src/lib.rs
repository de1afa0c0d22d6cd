//! Docker-backed function execution
//!
//! This crate provides the execution engine: a thin client over the Docker
//! CLI, a warm-container pool, per-run resource sampling, and the runtime
//! facade the server and CLI drive.

mod backend;
mod config;
mod executor;
mod pool;
mod runtime;
mod stats;

pub use backend::{interpreter, ContainerOpts, DockerApi, DockerCli, Exited, ResourceUsage};
pub use config::RuntimeConfig;
pub use executor::{Executor, RunOutcome, RunSpec};
pub use pool::{PoolKey, WarmPool};
pub use runtime::{ExecutionReport, FaasRuntime};
