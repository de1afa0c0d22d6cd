use faascore::Language;

/// Configuration for the execution runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub python_image: String,
    /// Pinned to Node 18
    pub node_image: String,
    /// Passed to `--memory` for every container
    pub memory_limit: String,
    /// Passed to `--cpus` for every container
    pub cpu_limit: String,
    /// Docker network mode; user code gets no network by default
    pub network: String,
    /// Idle containers kept per (language, runtime) combination
    pub prewarm_count: usize,
    pub stats_interval_ms: u64,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            python_image: "python:3.11-alpine".to_string(),
            node_image: "node:18-alpine".to_string(),
            memory_limit: "256m".to_string(),
            cpu_limit: "1.0".to_string(),
            network: "none".to_string(),
            prewarm_count: 2,
            stats_interval_ms: 250,
            event_buffer_size: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn image_for(&self, language: Language) -> &str {
        match language {
            Language::Python => &self.python_image,
            Language::Node => &self.node_image,
        }
    }
}
