//! Docker container-based execution
//!
//! Runs each plan in a fresh container through the Docker Engine API. The
//! container is created, started, waited on with a host-side deadline, its
//! logs are read and it is force-removed. A guard removes it as well if the
//! request future is dropped halfway, so an abandoned request never leaves a
//! running container behind.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SandboxConfig;
use crate::error::{Error, Result};
use crate::sandbox::collector::{OutputBuffer, ProcessOutput};
use crate::sandbox::executor::CodeExecutor;
use crate::sandbox::profile::{ContainerPlan, SCRATCH_MOUNT};

/// Docker container executor
pub struct ContainerExecutor {
    /// Docker client
    docker: Docker,
}

impl ContainerExecutor {
    /// Connect to the local Docker daemon and make sure the images exist
    pub async fn new(config: &SandboxConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Sandbox(format!("Failed to connect to Docker: {}", e)))?;

        // Verify connection
        docker
            .ping()
            .await
            .map_err(|e| Error::Sandbox(format!("Docker ping failed: {}", e)))?;

        info!("Container executor connected to Docker");

        let executor = ContainerExecutor { docker };

        if config.pull_images {
            for image in [&config.javascript.image, &config.java.image] {
                executor.ensure_image(image).await?;
            }
        }

        Ok(executor)
    }

    /// Ensure the required Docker image is available
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!("Image {} already present", image);
            return Ok(());
        }

        info!("Pulling Docker image: {}", image);

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(Error::Sandbox(format!("Failed to pull image {}: {}", image, e)));
                }
            }
        }

        info!("Image {} pulled successfully", image);
        Ok(())
    }

    /// Translate a plan into the Engine API container configuration
    fn container_config(plan: &ContainerPlan) -> Config<String> {
        let mut tmpfs = HashMap::new();
        tmpfs.insert(SCRATCH_MOUNT.to_string(), plan.tmpfs_options.clone());

        Config {
            image: Some(plan.image.clone()),
            cmd: Some(plan.cmd.clone()),
            user: Some(plan.user.clone()),
            working_dir: Some(plan.working_dir.clone()),
            network_disabled: Some(true),
            attach_stdin: Some(false),
            open_stdin: Some(false),
            tty: Some(false),
            host_config: Some(bollard::service::HostConfig {
                memory: Some(plan.memory_bytes),
                memory_swap: Some(plan.memory_bytes),
                nano_cpus: Some(plan.nano_cpus),
                pids_limit: plan.pids_limit,
                network_mode: Some("none".to_string()),
                readonly_rootfs: Some(true),
                cap_drop: Some(vec!["ALL".to_string()]),
                security_opt: Some(vec!["no-new-privileges".to_string()]),
                tmpfs: Some(tmpfs),
                binds: Some(plan.mounts.iter().map(|m| m.spec()).collect()),
                auto_remove: Some(false), // We'll remove manually after getting logs
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Create and run a container for one plan
    async fn run_container(&self, plan: &ContainerPlan) -> Result<ProcessOutput> {
        let name = plan.name.as_str();
        let mut guard = ContainerGuard::new(self.docker.clone(), name);

        let create_options = CreateContainerOptions {
            name,
            platform: None,
        };

        self.docker
            .create_container(Some(create_options), Self::container_config(plan))
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to create container: {}", e)))?;

        debug!("Created container: {}", name);

        let start = Instant::now();

        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to start container: {}", e)))?;

        // Wait for container with the host-side backstop
        let wait_result =
            tokio::time::timeout(plan.host_deadline, self.wait_for_container(name)).await;

        let elapsed = start.elapsed();

        let (exit_code, host_timed_out) = match wait_result {
            Ok(Ok(code)) => (Some(code), false),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    "Container {} still running after {:?}, killing it",
                    name, plan.host_deadline
                );
                if let Err(e) = self
                    .docker
                    .kill_container(name, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!("Failed to kill container {}: {}", name, e);
                }
                (None, true)
            }
        };

        // Partial logs of a killed container are still available until removal
        let (stdout, stderr) = self.get_container_logs(name, plan.max_output_bytes).await;

        self.remove_container(name).await;
        guard.disarm();

        let truncated = stdout.is_truncated() || stderr.is_truncated();
        Ok(ProcessOutput {
            exit_code,
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            elapsed,
            host_timed_out,
            truncated,
        })
    }

    /// Wait for a container to finish and return its exit code
    async fn wait_for_container(&self, name: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(name, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // Non-zero exits surface as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(Error::Container(format!("Wait failed: {}", e))),
            None => Err(Error::Container("Container wait stream ended".to_string())),
        }
    }

    /// Get container logs, capped per stream
    async fn get_container_logs(&self, name: &str, max_bytes: usize) -> (OutputBuffer, OutputBuffer) {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));

        let mut stdout = OutputBuffer::new(max_bytes);
        let mut stderr = OutputBuffer::new(max_bytes);

        while let Some(result) = stream.next().await {
            match result {
                Ok(LogOutput::StdOut { message }) => stdout.push(&message),
                Ok(LogOutput::StdErr { message }) => stderr.push(&message),
                Err(e) => {
                    warn!("Error reading logs: {}", e);
                    break;
                }
                _ => {}
            }
        }

        (stdout, stderr)
    }

    /// Force-remove a container; failures are only logged
    async fn remove_container(&self, name: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => debug!("Removed container: {}", name),
            Err(e) => warn!("Failed to remove container {}: {}", name, e),
        }
    }
}

#[async_trait]
impl CodeExecutor for ContainerExecutor {
    fn name(&self) -> &str {
        "docker"
    }

    async fn execute(&self, plan: &ContainerPlan) -> Result<ProcessOutput> {
        self.run_container(plan).await
    }
}

/// Force-removes a container on drop unless disarmed
struct ContainerGuard {
    docker: Docker,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(docker: Docker, name: &str) -> Self {
        ContainerGuard {
            docker,
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to remove container {}", self.name);
            return;
        };

        let docker = self.docker.clone();
        let name = std::mem::take(&mut self.name);
        handle.spawn(async move {
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            match docker.remove_container(&name, Some(options)).await {
                Ok(()) => info!("Removed abandoned container {}", name),
                Err(e) => debug!("Abandoned container {} not removed: {}", name, e),
            }
        });
    }
}
