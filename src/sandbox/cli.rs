//! Docker CLI-based execution
//!
//! Spawns `docker run --rm` for each plan. Arguments are passed as a vector,
//! never through a shell. Both output pipes are drained while the container
//! runs so that a killed container still reports what it printed.
//!
//! `docker run` exits 125 both when the daemon fails and when the program
//! itself exits 125. The container id file written via `--cidfile` tells the
//! two apart.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SandboxConfig;
use crate::error::{Error, Result};
use crate::sandbox::collector::{OutputBuffer, ProcessOutput};
use crate::sandbox::executor::CodeExecutor;
use crate::sandbox::profile::ContainerPlan;

/// Exit status of `docker run` when the daemon itself failed
const DOCKER_RUN_FAILED: i32 = 125;

/// Docker CLI executor
pub struct CliExecutor {
    /// Resolved docker binary
    binary: PathBuf,
}

impl CliExecutor {
    /// Locate the docker binary and make sure the images exist
    pub async fn new(config: &SandboxConfig) -> Result<Self> {
        let binary = which::which(&config.docker_binary).map_err(|e| {
            Error::Sandbox(format!("Docker CLI {} not found: {}", config.docker_binary, e))
        })?;

        info!("CLI executor using {}", binary.display());

        let executor = CliExecutor { binary };

        if config.pull_images {
            for image in [&config.javascript.image, &config.java.image] {
                executor.ensure_image(image).await?;
            }
        }

        Ok(executor)
    }

    /// Pull an image unless it is already present
    async fn ensure_image(&self, image: &str) -> Result<()> {
        let present = Command::new(&self.binary)
            .args(["image", "inspect", image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to run docker: {}", e)))?
            .success();

        if present {
            debug!("Image {} already present", image);
            return Ok(());
        }

        info!("Pulling Docker image: {}", image);
        let output = Command::new(&self.binary)
            .args(["pull", image])
            .output()
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to run docker: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Sandbox(format!(
                "Failed to pull image {}: {}",
                image,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!("Image {} pulled successfully", image);
        Ok(())
    }

    /// Best-effort `docker kill` for a container that outlived its deadline
    async fn kill_container(&self, name: &str) {
        let result = Command::new(&self.binary)
            .args(["kill", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) if status.success() => debug!("Killed container {}", name),
            Ok(status) => warn!("docker kill {} exited with {}", name, status),
            Err(e) => warn!("Failed to run docker kill {}: {}", name, e),
        }
    }
}

#[async_trait]
impl CodeExecutor for CliExecutor {
    fn name(&self) -> &str {
        "cli"
    }

    async fn execute(&self, plan: &ContainerPlan) -> Result<ProcessOutput> {
        let mut command = Command::new(&self.binary);
        command
            .args(plan.docker_run_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Launching {} via {}", plan.name, self.binary.display());

        let start = Instant::now();

        let mut child = command
            .spawn()
            .map_err(|e| Error::Sandbox(format!("Failed to spawn docker: {}", e)))?;

        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, plan.max_output_bytes)));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, plan.max_output_bytes)));

        let wait_result = tokio::time::timeout(plan.host_deadline, child.wait()).await;

        let (exit_code, host_timed_out) = match wait_result {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => return Err(Error::Sandbox(format!("Failed to wait for docker: {}", e))),
            Err(_) => {
                warn!(
                    "Container {} still running after {:?}, killing it",
                    plan.name, plan.host_deadline
                );
                self.kill_container(&plan.name).await;
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill docker client: {}", e);
                }
                (None, true)
            }
        };

        let elapsed = start.elapsed();

        let stdout = join_reader(stdout_task, plan.max_output_bytes).await;
        let stderr = join_reader(stderr_task, plan.max_output_bytes).await;

        // 125 is also a legal program exit status; only trust it as a daemon
        // failure when no container was ever created
        if exit_code == Some(DOCKER_RUN_FAILED) && !container_created(&plan.cidfile).await {
            return Err(Error::Sandbox(format!(
                "docker run failed: {}",
                stderr.into_string().trim()
            )));
        }

        let truncated = stdout.is_truncated() || stderr.is_truncated();
        Ok(ProcessOutput {
            exit_code: exit_code.map(i64::from),
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            elapsed,
            host_timed_out,
            truncated,
        })
    }
}

/// Whether `docker run --cidfile` recorded a container id
async fn container_created(cidfile: &Path) -> bool {
    match tokio::fs::read_to_string(cidfile).await {
        Ok(id) => !id.trim().is_empty(),
        Err(_) => false,
    }
}

/// Read a pipe to the end, keeping at most `max` bytes
async fn read_capped<R>(mut reader: R, max: usize) -> OutputBuffer
where
    R: AsyncRead + Unpin,
{
    let mut buffer = OutputBuffer::new(max);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.push(&chunk[..n]),
            Err(e) => {
                warn!("Error reading container output: {}", e);
                break;
            }
        }
    }
    buffer
}

async fn join_reader(
    task: Option<tokio::task::JoinHandle<OutputBuffer>>,
    max: usize,
) -> OutputBuffer {
    match task {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            warn!("Output reader task failed: {}", e);
            OutputBuffer::new(max)
        }),
        None => OutputBuffer::new(max),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sandbox::executor::{ExecutionRequest, Language};
    use crate::sandbox::workspace::Workspace;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Write an executable stand-in for the docker binary
    fn fake_docker(dir: &Path, body: &str) -> SandboxConfig {
        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n[ \"$1\" = kill ] && exit 0\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = SandboxConfig::default();
        config.docker_binary = path.display().to_string();
        config.pull_images = false;
        config.scratch_dir = dir.join("scratch");
        config
    }

    async fn run(config: &SandboxConfig, request: ExecutionRequest) -> Result<ProcessOutput> {
        let executor = CliExecutor::new(config).await?;
        let workspace = Workspace::materialize(&config.scratch_dir, &request).await?;
        let plan = ContainerPlan::build(request.language, &workspace, config)?;
        let output = executor.execute(&plan).await;
        workspace.cleanup().await;
        output
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let dir = tempdir().unwrap();
        let config = fake_docker(dir.path(), "echo hello\necho oops >&2\nexit 3");

        let output = run(&config, ExecutionRequest::new("x", Language::JavaScript))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
        assert!(!output.host_timed_out);
    }

    #[tokio::test]
    async fn test_daemon_failure_is_infrastructure() {
        let dir = tempdir().unwrap();
        let config = fake_docker(dir.path(), "echo 'Cannot connect to the Docker daemon' >&2\nexit 125");

        let err = run(&config, ExecutionRequest::new("x", Language::JavaScript))
            .await
            .unwrap_err();
        assert!(err.is_infrastructure());
        assert!(err.to_string().contains("Cannot connect"));
    }

    /// Shell snippet that writes the `--cidfile` argument like a real daemon would
    const WRITE_CIDFILE: &str =
        "prev=\"\"\nfor a in \"$@\"; do\n  if [ \"$prev\" = --cidfile ]; then echo 4f2a9c > \"$a\"; fi\n  prev=\"$a\"\ndone";

    #[tokio::test]
    async fn test_program_exit_125_is_not_infrastructure() {
        let dir = tempdir().unwrap();
        let body = format!("{}\necho partial\necho 'user failure' >&2\nexit 125", WRITE_CIDFILE);
        let config = fake_docker(dir.path(), &body);

        let output = run(&config, ExecutionRequest::new("process.exit(125)", Language::JavaScript))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(125));
        assert_eq!(output.stdout, "partial\n");
        assert_eq!(output.stderr, "user failure\n");
    }

    #[tokio::test]
    async fn test_host_deadline_kills_and_keeps_partial_output() {
        let dir = tempdir().unwrap();
        let mut config = fake_docker(dir.path(), "echo started\nexec sleep 30");
        config.javascript.timeout_secs = 1;
        config.host_grace = Duration::from_millis(100);

        let started = Instant::now();
        let output = run(&config, ExecutionRequest::new("x", Language::JavaScript))
            .await
            .unwrap();

        assert!(output.host_timed_out);
        assert_eq!(output.exit_code, None);
        assert_eq!(output.stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_output_cap() {
        let dir = tempdir().unwrap();
        let mut config = fake_docker(dir.path(), "printf 'abcdefghij'");
        config.max_output_bytes = 4;

        let output = run(&config, ExecutionRequest::new("x", Language::JavaScript))
            .await
            .unwrap();
        assert!(output.truncated);
        assert!(output.stdout.starts_with("abcd"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let mut config = SandboxConfig::default();
        config.docker_binary = "/nonexistent/docker".to_string();
        config.pull_images = false;

        let err = CliExecutor::new(&config).await.err().unwrap();
        assert!(err.is_infrastructure());
    }
}
