//! Core abstractions for the faas engine
//!
//! This crate provides the fundamental types that all other components
//! depend on: function definitions, execution metrics, errors, and the
//! execution event bus.

mod error;
mod events;
mod function;
mod metrics;

pub use error::{ExecError, FaasError, FunctionError};
pub use events::{EventBus, EventEmitter, ExecutionEvent, ExecutionId, LogEvent};
pub use function::{Function, FunctionId, Language, RuntimeKind, CODE_KEY};
pub use metrics::{MetricsAggregate, MetricsSample};

/// Result type for faas operations
pub type Result<T> = std::result::Result<T, FaasError>;
