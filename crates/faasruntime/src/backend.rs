use async_trait::async_trait;
use faascore::{ExecError, Language, RuntimeKind};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::stats::parse_stats_line;

/// Interpreter invocation that reads the program from stdin
pub fn interpreter(language: Language) -> Vec<String> {
    let parts: &[&str] = match language {
        Language::Python => &["python3", "-"],
        Language::Node => &["node", "-"],
    };
    parts.iter().map(|s| s.to_string()).collect()
}

/// Settings for one container
#[derive(Debug, Clone)]
pub struct ContainerOpts {
    pub name: String,
    pub image: String,
    pub runtime: RuntimeKind,
    pub network: String,
    pub memory_limit: String,
    pub cpu_limit: String,
}

/// Result of a finished (or timed out) container process
#[derive(Debug, Clone, Default)]
pub struct Exited {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl Exited {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// One resource reading for a running container
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    /// Resident memory in MiB
    pub memory_mb: f64,
    /// CPU utilisation in percent
    pub cpu_percent: f64,
}

/// Operations the engine needs from Docker
///
/// The production implementation shells out to the `docker` CLI; tests
/// substitute their own.
#[async_trait]
pub trait DockerApi: Send + Sync {
    /// Fails when the daemon is unreachable
    async fn ping(&self) -> Result<(), ExecError>;

    /// Names of the OCI runtimes the daemon has configured
    async fn runtimes(&self) -> Result<Vec<String>, ExecError>;

    async fn image_present(&self, image: &str) -> Result<bool, ExecError>;

    async fn pull(&self, image: &str) -> Result<(), ExecError>;

    /// Run an ephemeral container, piping `code` to the program's stdin.
    /// A timeout force-removes the container and is reported via
    /// `Exited::timed_out`, not as an error.
    async fn run_stdin(
        &self,
        opts: &ContainerOpts,
        program: &[String],
        code: &[u8],
        timeout: Duration,
    ) -> Result<Exited, ExecError>;

    /// Start a detached idle container for later `exec_stdin` calls
    async fn start_idle(&self, opts: &ContainerOpts) -> Result<(), ExecError>;

    /// Execute a program inside a running container, piping `code` to stdin
    async fn exec_stdin(
        &self,
        name: &str,
        program: &[String],
        code: &[u8],
        timeout: Duration,
    ) -> Result<Exited, ExecError>;

    /// Force-remove a container; missing containers are not an error
    async fn remove(&self, name: &str) -> Result<(), ExecError>;

    /// One resource reading; `None` when the container is already gone
    async fn stats_once(&self, name: &str) -> Option<ResourceUsage>;
}

/// `DockerApi` implementation over the `docker` command line client
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    /// `--name` through the image, shared by `run` and `run -d`
    fn container_args(opts: &ContainerOpts) -> Vec<String> {
        vec![
            "--name".to_string(),
            opts.name.clone(),
            format!("--runtime={}", opts.runtime),
            "--network".to_string(),
            opts.network.clone(),
            "--memory".to_string(),
            opts.memory_limit.clone(),
            "--cpus".to_string(),
            opts.cpu_limit.clone(),
            opts.image.clone(),
        ]
    }

    /// Spawn, feed stdin, collect both output streams and the exit status
    async fn piped_wait(
        &self,
        mut cmd: Command,
        stdin_data: &[u8],
        timeout: Duration,
        container: Option<&str>,
    ) -> Result<Exited, ExecError> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::SpawnFailed(format!("failed to spawn {}: {e}", self.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| ExecError::ExecutionFailed(format!("failed to write stdin: {e}")))?;
            drop(stdin);
        }

        let mut stdout_opt = child.stdout.take();
        let mut stderr_opt = child.stderr.take();

        let stdout_future = async move {
            let mut data = Vec::new();
            if let Some(ref mut stdout) = stdout_opt {
                let _ = stdout.read_to_end(&mut data).await;
            }
            data
        };

        let stderr_future = async move {
            let mut data = Vec::new();
            if let Some(ref mut stderr) = stderr_opt {
                let _ = stderr.read_to_end(&mut data).await;
            }
            data
        };

        let waited = tokio::time::timeout(timeout, async {
            let (stdout, stderr) = tokio::join!(stdout_future, stderr_future);
            let status = child
                .wait()
                .await
                .map_err(|e| ExecError::ExecutionFailed(format!("process wait failed: {e}")))?;
            Ok::<_, ExecError>((status, stdout, stderr))
        })
        .await;

        match waited {
            Ok(Ok((status, stdout, stderr))) => Ok(Exited {
                stdout: String::from_utf8_lossy(&stdout).to_string(),
                stderr: String::from_utf8_lossy(&stderr).to_string(),
                exit_code: status.code().unwrap_or(-1),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let _ = child.kill().await;
                if let Some(name) = container {
                    let _ = self.remove(name).await;
                }
                Ok(Exited {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: -1,
                    timed_out: true,
                })
            }
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DockerApi for DockerCli {
    async fn ping(&self) -> Result<(), ExecError> {
        let output = self
            .command()
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::DaemonUnavailable(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ExecError::DaemonUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn runtimes(&self) -> Result<Vec<String>, ExecError> {
        let output = self
            .command()
            .args(["info", "--format", "{{json .Runtimes}}"])
            .output()
            .await
            .map_err(|e| ExecError::DaemonUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(ExecError::DaemonUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let parsed: serde_json::Value = serde_json::from_str(raw.trim())
            .map_err(|e| ExecError::ExecutionFailed(format!("unparsable runtime list: {e}")))?;

        Ok(parsed
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn image_present(&self, image: &str) -> Result<bool, ExecError> {
        let status = self
            .command()
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ExecError::DaemonUnavailable(e.to_string()))?;
        Ok(status.success())
    }

    async fn pull(&self, image: &str) -> Result<(), ExecError> {
        tracing::info!("Pulling image: {image}");
        let output = self
            .command()
            .args(["pull", image])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::DaemonUnavailable(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ExecError::ImageUnavailable(format!(
                "{image}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn run_stdin(
        &self,
        opts: &ContainerOpts,
        program: &[String],
        code: &[u8],
        timeout: Duration,
    ) -> Result<Exited, ExecError> {
        let mut cmd = self.command();
        cmd.args(["run", "--rm", "-i"]);
        cmd.args(Self::container_args(opts));
        cmd.args(program);
        self.piped_wait(cmd, code, timeout, Some(&opts.name)).await
    }

    async fn start_idle(&self, opts: &ContainerOpts) -> Result<(), ExecError> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        args.extend(Self::container_args(opts));
        args.extend(["tail", "-f", "/dev/null"].map(String::from));

        let output = self
            .command()
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::SpawnFailed(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ExecError::SpawnFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn exec_stdin(
        &self,
        name: &str,
        program: &[String],
        code: &[u8],
        timeout: Duration,
    ) -> Result<Exited, ExecError> {
        let mut cmd = self.command();
        cmd.args(["exec", "-i", name]);
        cmd.args(program);
        self.piped_wait(cmd, code, timeout, None).await
    }

    async fn remove(&self, name: &str) -> Result<(), ExecError> {
        let _ = self
            .command()
            .args(["rm", "-f", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ExecError::ExecutionFailed(e.to_string()))?;
        Ok(())
    }

    async fn stats_once(&self, name: &str) -> Option<ResourceUsage> {
        let output = self
            .command()
            .args([
                "stats",
                "--no-stream",
                "--format",
                "{{.MemUsage}};{{.CPUPerc}}",
                name,
            ])
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let line = String::from_utf8_lossy(&output.stdout);
        parse_stats_line(line.trim())
    }
}
