use async_trait::async_trait;
use faascore::{ExecError, FaasError, Function, FunctionError, Language, RuntimeKind};
use faasruntime::{
    ContainerOpts, DockerApi, Exited, FaasRuntime, ResourceUsage, RuntimeConfig,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// Canned Docker backend: every run returns a copy of `exited`
struct MockDocker {
    exited: Exited,
    runtimes: Vec<String>,
    run_delay: Option<Duration>,
    usage: Option<ResourceUsage>,
    calls: Mutex<Vec<String>>,
}

impl MockDocker {
    fn new(exited: Exited) -> Self {
        Self {
            exited,
            runtimes: vec!["runc".to_string(), "runsc".to_string()],
            run_delay: None,
            usage: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl DockerApi for MockDocker {
    async fn ping(&self) -> Result<(), ExecError> {
        self.log("ping");
        Ok(())
    }

    async fn runtimes(&self) -> Result<Vec<String>, ExecError> {
        self.log("runtimes");
        Ok(self.runtimes.clone())
    }

    async fn image_present(&self, image: &str) -> Result<bool, ExecError> {
        self.log(format!("inspect:{image}"));
        Ok(true)
    }

    async fn pull(&self, image: &str) -> Result<(), ExecError> {
        self.log(format!("pull:{image}"));
        Ok(())
    }

    async fn run_stdin(
        &self,
        opts: &ContainerOpts,
        _program: &[String],
        _code: &[u8],
        _timeout: Duration,
    ) -> Result<Exited, ExecError> {
        self.log(format!("run:{}", opts.name));
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.exited.clone())
    }

    async fn start_idle(&self, opts: &ContainerOpts) -> Result<(), ExecError> {
        self.log(format!("start_idle:{}", opts.name));
        Ok(())
    }

    async fn exec_stdin(
        &self,
        name: &str,
        _program: &[String],
        _code: &[u8],
        _timeout: Duration,
    ) -> Result<Exited, ExecError> {
        self.log(format!("exec:{name}"));
        Ok(self.exited.clone())
    }

    async fn remove(&self, name: &str) -> Result<(), ExecError> {
        self.log(format!("rm:{name}"));
        Ok(())
    }

    async fn stats_once(&self, _name: &str) -> Option<ResourceUsage> {
        self.log("stats");
        self.usage
    }
}

fn ok_exit(stdout: &str) -> Exited {
    Exited {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
        timed_out: false,
    }
}

fn no_prewarm_config() -> RuntimeConfig {
    RuntimeConfig {
        prewarm_count: 0,
        ..RuntimeConfig::default()
    }
}

fn python_function(code: &str) -> Function {
    Function::new("greeter", "/greet", Language::Python)
        .with_code(code)
        .with_timeout(5)
}

#[tokio::test]
async fn execute_returns_trimmed_output_and_clean_sample() {
    let docker = Arc::new(MockDocker::new(ok_exit("hello\n")));
    let runtime = FaasRuntime::with_backend(no_prewarm_config(), docker.clone());

    let report = runtime.execute(&python_function("print('hello')")).await.unwrap();

    assert_eq!(report.output, "hello");
    assert_eq!(report.sample.stdout, "hello\n");
    assert!(report.success);
    assert!(!report.warm_start);
    assert!(!report.sample.error);
    assert_eq!(report.sample.function_name, "greeter");
    assert_eq!(report.sample.runtime, RuntimeKind::Runc);
    assert_eq!(docker.count("run:faas-run-"), 1);
}

#[tokio::test]
async fn execute_without_code_is_rejected_before_any_container() {
    let docker = Arc::new(MockDocker::new(ok_exit("")));
    let runtime = FaasRuntime::with_backend(no_prewarm_config(), docker.clone());

    let function = Function::new("empty", "/empty", Language::Python);
    match runtime.execute(&function).await {
        Err(FaasError::Function(FunctionError::MissingCode)) => {}
        other => panic!("expected MissingCode, got {other:?}"),
    }
    assert_eq!(docker.count("run:"), 0);
}

#[tokio::test]
async fn nonzero_exit_marks_sample_as_error() {
    let failed = Exited {
        stdout: String::new(),
        stderr: "Traceback: boom".to_string(),
        exit_code: 1,
        timed_out: false,
    };
    let runtime =
        FaasRuntime::with_backend(no_prewarm_config(), Arc::new(MockDocker::new(failed)));

    let report = runtime.execute(&python_function("raise SystemExit(1)")).await.unwrap();

    assert!(!report.success);
    assert!(report.sample.error);
    assert_eq!(report.exit_code, 1);
    assert!(report.stderr.contains("boom"));
}

#[tokio::test]
async fn timeout_is_reported_and_still_sampled() {
    let timed_out = Exited {
        exit_code: -1,
        timed_out: true,
        ..Exited::default()
    };
    let runtime =
        FaasRuntime::with_backend(no_prewarm_config(), Arc::new(MockDocker::new(timed_out)));

    let report = runtime
        .execute(&python_function("while True: pass"))
        .await
        .unwrap();

    assert!(report.timed_out);
    assert!(!report.success);
    assert!(report.sample.error);
}

#[tokio::test]
async fn unknown_runtime_is_rejected_after_discovery() {
    let mut docker = MockDocker::new(ok_exit("hi\n"));
    docker.runtimes = vec!["runc".to_string()];
    let docker = Arc::new(docker);
    let runtime = FaasRuntime::with_backend(no_prewarm_config(), docker.clone());

    runtime.ensure_ready().await.unwrap();

    let function = python_function("print('hi')").with_runtime(RuntimeKind::Runsc);
    match runtime.execute(&function).await {
        Err(FaasError::Exec(ExecError::RuntimeUnavailable(r))) => assert_eq!(r, "runsc"),
        other => panic!("expected RuntimeUnavailable, got {other:?}"),
    }
    assert_eq!(docker.count("run:"), 0);
}

#[tokio::test]
async fn startup_prewarms_every_available_combination() {
    let config = RuntimeConfig {
        prewarm_count: 2,
        ..RuntimeConfig::default()
    };
    let docker = Arc::new(MockDocker::new(ok_exit("")));
    let runtime = FaasRuntime::with_backend(config, docker.clone());

    runtime.startup().await.unwrap();

    // 2 languages x 2 runtimes x depth 2
    assert_eq!(docker.count("start_idle:faas-warm-"), 8);
    assert_eq!(
        runtime.pool().depth((Language::Python, RuntimeKind::Runsc)).await,
        2
    );
}

#[tokio::test]
async fn prewarm_skips_missing_runsc() {
    let config = RuntimeConfig {
        prewarm_count: 1,
        ..RuntimeConfig::default()
    };
    let mut docker = MockDocker::new(ok_exit(""));
    docker.runtimes = vec!["runc".to_string()];
    let docker = Arc::new(docker);
    let runtime = FaasRuntime::with_backend(config, docker.clone());

    runtime.startup().await.unwrap();

    assert_eq!(docker.count("start_idle:"), 2);
    assert_eq!(runtime.pool().depth((Language::Node, RuntimeKind::Runsc)).await, 0);
}

#[tokio::test]
async fn warm_container_is_used_once_and_removed() {
    let config = RuntimeConfig {
        prewarm_count: 1,
        ..RuntimeConfig::default()
    };
    let docker = Arc::new(MockDocker::new(ok_exit("warm\n")));
    let runtime = FaasRuntime::with_backend(config, docker.clone());
    runtime.startup().await.unwrap();

    let report = runtime.execute(&python_function("print('warm')")).await.unwrap();

    assert!(report.warm_start);
    assert_eq!(docker.count("exec:faas-warm-python-runc-"), 1);
    assert_eq!(docker.count("rm:faas-warm-python-runc-"), 1);
    // Cold path never ran
    assert_eq!(docker.count("run:"), 0);
}

#[tokio::test]
async fn resource_peaks_land_in_the_sample() {
    let mut docker = MockDocker::new(ok_exit("done\n"));
    docker.run_delay = Some(Duration::from_millis(120));
    docker.usage = Some(ResourceUsage {
        memory_mb: 5.0,
        cpu_percent: 1.5,
    });
    let runtime = FaasRuntime::with_backend(no_prewarm_config(), Arc::new(docker));

    let report = runtime.execute(&python_function("print('done')")).await.unwrap();

    assert_eq!(report.sample.memory_usage, 5.0);
    assert_eq!(report.sample.cpu_usage, 1.5);
    assert!(report.sample.response_time > 0.0);
}

#[tokio::test]
async fn shutdown_removes_idle_containers() {
    let config = RuntimeConfig {
        prewarm_count: 1,
        ..RuntimeConfig::default()
    };
    let docker = Arc::new(MockDocker::new(ok_exit("")));
    let runtime = FaasRuntime::with_backend(config, docker.clone());
    runtime.startup().await.unwrap();

    runtime.shutdown().await;

    assert_eq!(docker.count("rm:faas-warm-"), 4);
    assert_eq!(runtime.pool().depth((Language::Python, RuntimeKind::Runc)).await, 0);
}
