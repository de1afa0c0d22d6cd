//! SQLite persistence for function definitions and execution metrics
//!
//! One database file holds both the function registry and the per-execution
//! measurement rows the metrics endpoints aggregate over.

mod functions;
mod metrics;
mod store;

pub use store::{Store, StoreError};
