use crate::backend::{ContainerOpts, DockerApi};
use crate::config::RuntimeConfig;
use faascore::{ExecError, Language, RuntimeKind};
use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type PoolKey = (Language, RuntimeKind);

/// Pool of pre-started idle containers, one queue per
/// (language, runtime) combination.
///
/// Containers are single use: `acquire` hands one out, the executor removes
/// it after the run, and a background task starts a replacement.
pub struct WarmPool {
    config: RuntimeConfig,
    docker: Arc<dyn DockerApi>,
    idle: Mutex<HashMap<PoolKey, VecDeque<String>>>,
    cancel: CancellationToken,
}

impl WarmPool {
    pub fn new(config: RuntimeConfig, docker: Arc<dyn DockerApi>) -> Self {
        Self {
            config,
            docker,
            idle: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Fill every combination to the configured depth. Combinations whose
    /// runtime the daemon does not know are skipped with a warning.
    pub async fn prewarm_all(&self, available_runtimes: &[String]) {
        let mut jobs = Vec::new();
        for language in Language::ALL {
            for runtime in RuntimeKind::ALL {
                if !available_runtimes.iter().any(|r| r == runtime.as_str()) {
                    tracing::warn!(
                        "Skipping prewarm for {language}/{runtime}: runtime not installed"
                    );
                    continue;
                }
                for _ in 0..self.config.prewarm_count {
                    jobs.push(self.spawn_idle((language, runtime)));
                }
            }
        }

        for result in join_all(jobs).await {
            if let Err(e) = result {
                tracing::warn!("Prewarm failed: {e}");
            }
        }
    }

    /// Take a warm container for `key`, starting a replacement in the
    /// background. `None` when the pool has nothing warm for this key.
    pub async fn acquire(self: &Arc<Self>, key: PoolKey) -> Option<String> {
        let name = {
            let mut idle = self.idle.lock().await;
            idle.get_mut(&key).and_then(VecDeque::pop_front)
        }?;

        let pool = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = pool.spawn_idle(key) => {
                    if let Err(e) = result {
                        tracing::warn!("Failed to replenish warm pool: {e}");
                    }
                }
            }
        });

        Some(name)
    }

    /// Idle container count per key, for diagnostics
    pub async fn depth(&self, key: PoolKey) -> usize {
        self.idle
            .lock()
            .await
            .get(&key)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    async fn spawn_idle(&self, key: PoolKey) -> Result<(), ExecError> {
        let (language, runtime) = key;
        let name = format!("faas-warm-{language}-{runtime}-{}", Uuid::new_v4());
        let opts = ContainerOpts {
            name: name.clone(),
            image: self.config.image_for(language).to_string(),
            runtime,
            network: self.config.network.clone(),
            memory_limit: self.config.memory_limit.clone(),
            cpu_limit: self.config.cpu_limit.clone(),
        };

        self.docker.start_idle(&opts).await?;
        tracing::debug!("Warm container ready: {name}");

        self.idle.lock().await.entry(key).or_default().push_back(name);
        Ok(())
    }

    /// Stop replenishing and remove every idle container
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<String> = {
            let mut idle = self.idle.lock().await;
            idle.drain().flat_map(|(_, queue)| queue).collect()
        };
        for name in drained {
            let _ = self.docker.remove(&name).await;
        }
    }
}
