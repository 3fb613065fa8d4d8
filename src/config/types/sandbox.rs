//! Sandbox configuration types
//!
//! Backend selection, scratch area and the per-language container profiles.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Launcher backend
    #[serde(default)]
    pub backend: SandboxBackend,
    /// Parent directory for per-request workspaces
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Docker CLI binary (cli backend only), resolved on PATH
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
    /// User the program runs as inside the container
    #[serde(default = "default_user")]
    pub user: String,
    /// Maximum number of processes inside one container
    #[serde(default = "default_pids_limit")]
    pub pids_limit: i64,
    /// Extra time the host waits past the in-container timeout
    #[serde(default = "default_host_grace", with = "humantime_serde")]
    pub host_grace: Duration,
    /// Maximum captured bytes per output stream
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
    /// Reject unknown languages instead of running them as JavaScript
    #[serde(default)]
    pub strict_languages: bool,
    /// Pull missing images when the executor starts
    #[serde(default = "default_true")]
    pub pull_images: bool,
    /// JavaScript profile
    #[serde(default = "LanguageProfile::javascript")]
    pub javascript: LanguageProfile,
    /// Java profile
    #[serde(default = "LanguageProfile::java")]
    pub java: LanguageProfile,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            backend: SandboxBackend::default(),
            scratch_dir: default_scratch_dir(),
            docker_binary: default_docker_binary(),
            user: default_user(),
            pids_limit: default_pids_limit(),
            host_grace: default_host_grace(),
            max_output_bytes: default_max_output(),
            strict_languages: false,
            pull_images: true,
            javascript: LanguageProfile::javascript(),
            java: LanguageProfile::java(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("coderun")
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_user() -> String {
    "nobody".to_string()
}

fn default_pids_limit() -> i64 {
    64
}

fn default_host_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_max_output() -> usize {
    1024 * 1024 // 1MB
}

fn default_true() -> bool {
    true
}

/// Launcher backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxBackend {
    /// Docker Engine API over the local socket
    #[default]
    Docker,
    /// `docker run` through the CLI binary
    Cli,
}

impl std::str::FromStr for SandboxBackend {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" | "api" => Ok(SandboxBackend::Docker),
            "cli" => Ok(SandboxBackend::Cli),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid sandbox backend: {}. Valid: docker, cli",
                s
            ))),
        }
    }
}

impl std::fmt::Display for SandboxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxBackend::Docker => write!(f, "docker"),
            SandboxBackend::Cli => write!(f, "cli"),
        }
    }
}

/// Container limits for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Runtime image
    pub image: String,
    /// Memory limit ("128m", "1g", ...)
    pub memory_limit: String,
    /// CPU limit (number of CPUs)
    pub cpu_limit: f64,
    /// Size of the writable /tmp mount
    pub tmpfs_size: String,
    /// Whether /tmp allows executing files
    pub tmpfs_exec: bool,
    /// Wall-clock limit in seconds, enforced inside the container
    pub timeout_secs: u64,
}

impl LanguageProfile {
    /// Defaults for JavaScript
    pub fn javascript() -> Self {
        LanguageProfile {
            image: "node:18-alpine".to_string(),
            memory_limit: "128m".to_string(),
            cpu_limit: 0.5,
            tmpfs_size: "10m".to_string(),
            tmpfs_exec: false,
            timeout_secs: 10,
        }
    }

    /// Defaults for Java; javac output lands in /tmp and runs from there
    pub fn java() -> Self {
        LanguageProfile {
            image: "openjdk:11-jdk-slim".to_string(),
            memory_limit: "256m".to_string(),
            cpu_limit: 0.5,
            tmpfs_size: "20m".to_string(),
            tmpfs_exec: true,
            timeout_secs: 15,
        }
    }

    /// In-container wall-clock limit
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("docker".parse::<SandboxBackend>().unwrap(), SandboxBackend::Docker);
        assert_eq!("CLI".parse::<SandboxBackend>().unwrap(), SandboxBackend::Cli);
        assert!("podman".parse::<SandboxBackend>().is_err());
    }

    #[test]
    fn test_sandbox_config_default() {
        let config = SandboxConfig::default();
        assert_eq!(config.backend, SandboxBackend::Docker);
        assert_eq!(config.javascript.timeout_secs, 10);
        assert_eq!(config.java.timeout_secs, 15);
        assert!(!config.javascript.tmpfs_exec);
        assert!(config.java.tmpfs_exec);
        assert_eq!(config.host_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_profile_keeps_defaults() {
        let config: SandboxConfig =
            serde_json::from_str(r#"{"backend": "cli", "host_grace": "250ms"}"#).unwrap();
        assert_eq!(config.backend, SandboxBackend::Cli);
        assert_eq!(config.host_grace, Duration::from_millis(250));
        assert_eq!(config.java, LanguageProfile::java());
    }
}
