//! Per-language container profiles
//!
//! Turns a [`LanguageProfile`] and a materialized [`Workspace`] into a
//! [`ContainerPlan`]: everything a backend needs to start one locked-down
//! container. Both backends consume the same plan, so the security flags
//! live in exactly one place.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{LanguageProfile, SandboxConfig};
use crate::error::{Error, Result};
use crate::sandbox::executor::Language;
use crate::sandbox::workspace::{Workspace, STDIN_FILE_NAME};

/// Directory inside the container where workspace files are mounted
pub const APP_DIR: &str = "/app";

/// The only writable path inside the container
pub const SCRATCH_MOUNT: &str = "/tmp";

/// File in the workspace where `docker run --cidfile` records the container id
pub const CIDFILE_NAME: &str = "container.id";

/// A host file mounted read-only into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host: PathBuf,
    pub container: String,
}

impl BindMount {
    /// Docker bind spec, `host:container:ro`
    pub fn spec(&self) -> String {
        format!("{}:{}:ro", self.host.display(), self.container)
    }
}

/// Fully resolved container settings for one execution
#[derive(Debug, Clone)]
pub struct ContainerPlan {
    /// Unique container name
    pub name: String,
    /// Host path written by the CLI once the container exists; never mounted
    pub cidfile: PathBuf,
    pub language: Language,
    pub image: String,
    /// Command run by the image's entrypoint
    pub cmd: Vec<String>,
    pub user: String,
    pub working_dir: String,
    /// Memory cap in bytes; swap is capped to the same value
    pub memory_bytes: i64,
    pub nano_cpus: i64,
    pub pids_limit: Option<i64>,
    /// Options for the tmpfs at [`SCRATCH_MOUNT`]
    pub tmpfs_options: String,
    pub mounts: Vec<BindMount>,
    /// Limit enforced inside the container
    pub timeout: Duration,
    /// Host-side backstop, measured from launch
    pub host_deadline: Duration,
    /// Per-stream capture cap
    pub max_output_bytes: usize,
}

impl ContainerPlan {
    /// Build the plan for a workspace under the given sandbox settings
    pub fn build(language: Language, workspace: &Workspace, config: &SandboxConfig) -> Result<Self> {
        let profile = profile_for(config, language);

        let memory_bytes = parse_size(&profile.memory_limit).ok_or_else(|| {
            Error::Config(format!("Invalid memory limit: {}", profile.memory_limit))
        })?;
        parse_size(&profile.tmpfs_size)
            .ok_or_else(|| Error::Config(format!("Invalid tmpfs size: {}", profile.tmpfs_size)))?;

        let source_in_container = format!("{}/{}", APP_DIR, workspace.source_name());
        let mut mounts = vec![BindMount {
            host: workspace.source_path(),
            container: source_in_container.clone(),
        }];

        let timeout_secs = profile.timeout_secs.to_string();
        let cmd = match language {
            Language::JavaScript => vec![
                "timeout".to_string(),
                timeout_secs,
                "node".to_string(),
                source_in_container,
            ],
            Language::Java => {
                let class = workspace
                    .class_name()
                    .ok_or_else(|| Error::Internal("Java workspace without class name".to_string()))?;
                let mut script = format!(
                    "javac {} -d {} && java -cp {} {}",
                    source_in_container, SCRATCH_MOUNT, SCRATCH_MOUNT, class
                );
                if let Some(stdin_path) = workspace.stdin_path() {
                    let stdin_in_container = format!("{}/{}", APP_DIR, STDIN_FILE_NAME);
                    script.push_str(&format!(" < {}", stdin_in_container));
                    mounts.push(BindMount {
                        host: stdin_path,
                        container: stdin_in_container,
                    });
                }
                vec![
                    "timeout".to_string(),
                    timeout_secs,
                    "sh".to_string(),
                    "-c".to_string(),
                    script,
                ]
            }
        };

        Ok(ContainerPlan {
            name: format!("coderun-{}", workspace.id()),
            cidfile: workspace.dir().join(CIDFILE_NAME),
            language,
            image: profile.image.clone(),
            cmd,
            user: config.user.clone(),
            working_dir: APP_DIR.to_string(),
            memory_bytes,
            nano_cpus: (profile.cpu_limit * 1_000_000_000.0) as i64,
            pids_limit: (config.pids_limit > 0).then_some(config.pids_limit),
            tmpfs_options: tmpfs_options(profile),
            mounts,
            timeout: profile.timeout(),
            host_deadline: profile.timeout() + config.host_grace,
            max_output_bytes: config.max_output_bytes,
        })
    }

    /// Arguments for `docker` that start this plan, without the binary itself
    pub fn docker_run_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            self.name.clone(),
            "--cidfile".into(),
            self.cidfile.display().to_string(),
            "--network".into(),
            "none".into(),
            "--read-only".into(),
            "--memory".into(),
            self.memory_bytes.to_string(),
            "--memory-swap".into(),
            self.memory_bytes.to_string(),
            "--cpus".into(),
            format!("{}", self.nano_cpus as f64 / 1_000_000_000.0),
        ];
        if let Some(pids) = self.pids_limit {
            args.push("--pids-limit".into());
            args.push(pids.to_string());
        }
        args.extend([
            "--cap-drop".into(),
            "ALL".into(),
            "--security-opt".into(),
            "no-new-privileges".into(),
            "--user".into(),
            self.user.clone(),
            "--tmpfs".into(),
            format!("{}:{}", SCRATCH_MOUNT, self.tmpfs_options),
            "--workdir".into(),
            self.working_dir.clone(),
        ]);
        for mount in &self.mounts {
            args.push("--volume".into());
            args.push(mount.spec());
        }
        args.push(self.image.clone());
        args.extend(self.cmd.iter().cloned());
        args
    }
}

/// Profile configured for a language
pub fn profile_for(config: &SandboxConfig, language: Language) -> &LanguageProfile {
    match language {
        Language::JavaScript => &config.javascript,
        Language::Java => &config.java,
    }
}

fn tmpfs_options(profile: &LanguageProfile) -> String {
    let exec = if profile.tmpfs_exec { "exec" } else { "noexec" };
    format!("rw,{},nosuid,size={}", exec, profile.tmpfs_size.to_lowercase())
}

/// Parse a size string (e.g., "512m", "1g", "64kb") to bytes
pub fn parse_size(limit: &str) -> Option<i64> {
    let limit = limit.trim().to_lowercase();
    let (num_str, unit) = if limit.ends_with("g") || limit.ends_with("gb") {
        (limit.trim_end_matches(|c| c == 'g' || c == 'b'), "g")
    } else if limit.ends_with("m") || limit.ends_with("mb") {
        (limit.trim_end_matches(|c| c == 'm' || c == 'b'), "m")
    } else if limit.ends_with("k") || limit.ends_with("kb") {
        (limit.trim_end_matches(|c| c == 'k' || c == 'b'), "k")
    } else {
        (limit.trim_end_matches('b'), "b")
    };

    let num: i64 = num_str.parse().ok()?;

    let multiplier: i64 = match unit {
        "g" => 1024 * 1024 * 1024,
        "m" => 1024 * 1024,
        "k" => 1024,
        _ => 1,
    };
    num.checked_mul(multiplier)
}
