use crate::backend::{interpreter, ContainerOpts, DockerApi, Exited, ResourceUsage};
use crate::config::RuntimeConfig;
use crate::stats::sample_peaks;
use faascore::{EventEmitter, ExecError, Language, RuntimeKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One execution request
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub function_name: String,
    pub code: String,
    pub language: Language,
    pub runtime: RuntimeKind,
    pub timeout: Duration,
}

/// What came back from the container
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exited: Exited,
    /// Peak readings observed while the container ran
    pub usage: ResourceUsage,
    pub duration: Duration,
    pub warm_start: bool,
}

/// Runs one function execution in a container, cold or warm
pub struct Executor {
    config: RuntimeConfig,
    docker: Arc<dyn DockerApi>,
}

impl Executor {
    pub fn new(config: RuntimeConfig, docker: Arc<dyn DockerApi>) -> Self {
        Self { config, docker }
    }

    /// Execute `spec`, in `warm` when a pooled container is supplied,
    /// otherwise in a fresh ephemeral container
    pub async fn run(
        &self,
        spec: &RunSpec,
        warm: Option<String>,
        emitter: &EventEmitter,
    ) -> Result<RunOutcome, ExecError> {
        let program = interpreter(spec.language);
        let code = spec.code.as_bytes();
        let warm_start = warm.is_some();

        let container = match &warm {
            Some(name) => name.clone(),
            None => format!("faas-run-{}", Uuid::new_v4()),
        };

        let cancel = CancellationToken::new();
        let sampler = tokio::spawn(sample_peaks(
            self.docker.clone(),
            container.clone(),
            Duration::from_millis(self.config.stats_interval_ms),
            cancel.clone(),
        ));

        let start = Instant::now();
        let result = match &warm {
            Some(name) => {
                emitter.info(format!("Executing in warm container {name}"));
                self.docker
                    .exec_stdin(name, &program, code, spec.timeout)
                    .await
            }
            None => {
                emitter.info(format!("Starting container {container}"));
                let opts = ContainerOpts {
                    name: container.clone(),
                    image: self.config.image_for(spec.language).to_string(),
                    runtime: spec.runtime,
                    network: self.config.network.clone(),
                    memory_limit: self.config.memory_limit.clone(),
                    cpu_limit: self.config.cpu_limit.clone(),
                };
                self.docker
                    .run_stdin(&opts, &program, code, spec.timeout)
                    .await
            }
        };
        let duration = start.elapsed();

        cancel.cancel();
        let usage = sampler.await.unwrap_or_default();

        // Warm containers are single use
        if warm_start {
            let _ = self.docker.remove(&container).await;
        }

        let exited = result?;

        if exited.timed_out {
            emitter.warn(format!(
                "Container killed after exceeding {}s",
                spec.timeout.as_secs()
            ));
        } else if !exited.stderr.is_empty() {
            for line in exited.stderr.lines().take(10) {
                emitter.warn(format!("stderr: {line}"));
            }
        }

        Ok(RunOutcome {
            exited,
            usage,
            duration,
            warm_start,
        })
    }
}
