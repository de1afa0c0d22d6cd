use crate::backend::{DockerApi, DockerCli};
use crate::config::RuntimeConfig;
use crate::executor::{Executor, RunSpec};
use crate::pool::WarmPool;
use chrono::Utc;
use faascore::{
    EventBus, ExecError, ExecutionEvent, ExecutionId, FaasError, Function, FunctionError,
    MetricsSample, RuntimeKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Everything one execution produced
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub execution_id: ExecutionId,
    /// Container stdout with the trailing newline removed
    pub output: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
    pub timed_out: bool,
    pub warm_start: bool,
    pub sample: MetricsSample,
}

/// Main runtime for executing functions
pub struct FaasRuntime {
    config: RuntimeConfig,
    docker: Arc<dyn DockerApi>,
    executor: Executor,
    pool: Arc<WarmPool>,
    event_bus: Arc<EventBus>,
    runtimes: RwLock<Vec<String>>,
}

impl FaasRuntime {
    /// Create a runtime talking to the local Docker CLI
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_backend(config, Arc::new(DockerCli::new()))
    }

    /// Create a runtime over a custom Docker backend
    pub fn with_backend(config: RuntimeConfig, docker: Arc<dyn DockerApi>) -> Self {
        let executor = Executor::new(config.clone(), docker.clone());
        let pool = Arc::new(WarmPool::new(config.clone(), docker.clone()));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            config,
            docker,
            executor,
            pool,
            event_bus,
            runtimes: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn docker(&self) -> &Arc<dyn DockerApi> {
        &self.docker
    }

    /// Verify the daemon is reachable, discover installed runtimes and make
    /// sure both interpreter images are present
    pub async fn ensure_ready(&self) -> Result<(), ExecError> {
        self.docker.ping().await?;
        tracing::info!("Docker daemon is running and accessible");

        let runtimes = self.docker.runtimes().await?;
        if !runtimes.iter().any(|r| r == RuntimeKind::Runsc.as_str()) {
            tracing::warn!("gVisor (runsc) is not installed; sandboxed executions will fail");
        }
        *self.runtimes.write().await = runtimes;

        for image in [&self.config.python_image, &self.config.node_image] {
            if !self.docker.image_present(image).await? {
                self.docker.pull(image).await?;
            }
        }
        tracing::info!("Interpreter images present");
        Ok(())
    }

    /// Full server startup: readiness checks plus pool prewarming
    pub async fn startup(&self) -> Result<(), ExecError> {
        self.ensure_ready().await?;
        let runtimes = self.runtimes.read().await.clone();
        self.pool.prewarm_all(&runtimes).await;
        tracing::info!("Warm pool ready");
        Ok(())
    }

    /// Execute a function under its configured runtime
    pub async fn execute(&self, function: &Function) -> Result<ExecutionReport, FaasError> {
        self.execute_with(function, function.runtime).await
    }

    /// Execute a function under an explicit runtime (used by comparisons)
    pub async fn execute_with(
        &self,
        function: &Function,
        runtime: RuntimeKind,
    ) -> Result<ExecutionReport, FaasError> {
        let code = function.code().ok_or(FunctionError::MissingCode)?;

        {
            let known = self.runtimes.read().await;
            if !known.is_empty() && !known.iter().any(|r| r == runtime.as_str()) {
                return Err(ExecError::RuntimeUnavailable(runtime.to_string()).into());
            }
        }

        let execution_id = Uuid::new_v4();
        let emitter = self.event_bus.create_emitter(execution_id);
        self.event_bus.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            function: function.name.clone(),
            runtime,
            timestamp: Utc::now(),
        });
        tracing::info!(
            "Executing function {} ({}) under {runtime}",
            function.name,
            function.language
        );

        let spec = RunSpec {
            function_name: function.name.clone(),
            code: code.to_string(),
            language: function.language,
            runtime,
            timeout: Duration::from_secs(function.timeout_secs),
        };

        let warm = self.pool.acquire((function.language, runtime)).await;
        let outcome = match self.executor.run(&spec, warm, &emitter).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.event_bus.emit(ExecutionEvent::ExecutionFailed {
                    execution_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        let success = outcome.exited.success();
        let duration_ms = outcome.duration.as_millis() as u64;

        let mut sample = MetricsSample::new(function.name.clone(), runtime);
        sample.response_time = outcome.duration.as_secs_f64();
        sample.error = !success;
        sample.stdout = outcome.exited.stdout.clone();
        sample.stderr = outcome.exited.stderr.clone();
        sample.memory_usage = outcome.usage.memory_mb;
        sample.cpu_usage = outcome.usage.cpu_percent;

        if outcome.exited.timed_out {
            self.event_bus.emit(ExecutionEvent::ExecutionFailed {
                execution_id,
                error: ExecError::Timeout {
                    seconds: function.timeout_secs,
                }
                .to_string(),
                timestamp: Utc::now(),
            });
        } else {
            self.event_bus.emit(ExecutionEvent::ExecutionCompleted {
                execution_id,
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
        }

        Ok(ExecutionReport {
            execution_id,
            output: outcome.exited.stdout.trim_end().to_string(),
            stderr: outcome.exited.stderr,
            exit_code: outcome.exited.exit_code,
            success,
            timed_out: outcome.exited.timed_out,
            warm_start: outcome.warm_start,
            sample,
        })
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Idle warm containers for diagnostics
    pub fn pool(&self) -> &Arc<WarmPool> {
        &self.pool
    }

    /// Remove warm containers and stop replenishing
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

impl Default for FaasRuntime {
    fn default() -> Self {
        Self::new()
    }
}
