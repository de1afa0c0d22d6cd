use crate::RuntimeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurements recorded for a single execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSample {
    pub function_name: String,
    pub runtime: RuntimeKind,
    /// Wall clock time in seconds
    pub response_time: f64,
    pub error: bool,
    pub stdout: String,
    pub stderr: String,
    /// Peak resident memory in MiB
    pub memory_usage: f64,
    /// Peak CPU utilisation in percent
    pub cpu_usage: f64,
    pub recorded_at: DateTime<Utc>,
}

impl MetricsSample {
    pub fn new(function_name: impl Into<String>, runtime: RuntimeKind) -> Self {
        Self {
            function_name: function_name.into(),
            runtime,
            response_time: 0.0,
            error: false,
            stdout: String::new(),
            stderr: String::new(),
            memory_usage: 0.0,
            cpu_usage: 0.0,
            recorded_at: Utc::now(),
        }
    }
}

/// Averages over all recorded samples for one (function, runtime) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsAggregate {
    pub function_name: String,
    pub runtime: RuntimeKind,
    pub avg_response_time: f64,
    pub error_count: i64,
    pub avg_memory_usage_mb: f64,
    pub avg_cpu_usage_percent: f64,
}
