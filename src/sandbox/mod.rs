//! Sandbox module - Secure code execution in throwaway containers
//!
//! Stages of one execution:
//! - executor: request validation and the backend trait
//! - workspace: per-request scratch files and their cleanup
//! - profile: language profile → locked-down container plan
//! - container / cli: launch backends (Engine API or `docker` CLI)
//! - collector: exit status classification

mod cli;
mod collector;
mod container;
mod executor;
mod profile;
mod workspace;

pub use cli::CliExecutor;
pub use collector::{classify, collect, Outcome, OutputBuffer, ProcessOutput, TIMEOUT_EXIT_CODE};
pub use container::ContainerExecutor;
pub use executor::{
    timeout_message, CodeExecutor, ExecutionRequest, ExecutionResult, Language,
};
pub use profile::{parse_size, profile_for, BindMount, ContainerPlan};
pub use workspace::{generate_workspace_id, java_class_name, Workspace};

use crate::config::{SandboxBackend, SandboxConfig};
use crate::error::Result;

/// Create an executor based on the configuration
pub async fn create_executor(config: &SandboxConfig) -> Result<Box<dyn CodeExecutor>> {
    match config.backend {
        SandboxBackend::Docker => {
            let executor = ContainerExecutor::new(config).await?;
            Ok(Box::new(executor))
        }
        SandboxBackend::Cli => {
            let executor = CliExecutor::new(config).await?;
            Ok(Box::new(executor))
        }
    }
}
