//! Execution pipeline
//!
//! validate → materialize workspace → launch container → classify → cleanup.
//! The service holds no per-execution state, so any number of requests can
//! run through one instance concurrently.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::SandboxConfig;
use crate::error::Result;
use crate::sandbox::{
    self, collect, profile_for, CodeExecutor, ContainerPlan, ExecutionRequest, ExecutionResult,
    Language, Workspace,
};

/// Runs untrusted code through the configured sandbox backend
#[derive(Clone)]
pub struct ExecutionService {
    executor: Arc<dyn CodeExecutor>,
    config: Arc<SandboxConfig>,
}

impl ExecutionService {
    /// Create a service with the backend named in the configuration
    pub async fn new(config: SandboxConfig) -> Result<Self> {
        let executor = sandbox::create_executor(&config).await?;
        Ok(Self::with_executor(Arc::from(executor), config))
    }

    /// Create a service around an existing backend
    pub fn with_executor(executor: Arc<dyn CodeExecutor>, config: SandboxConfig) -> Self {
        ExecutionService {
            executor,
            config: Arc::new(config),
        }
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &str {
        self.executor.name()
    }

    /// Validate raw submission fields and execute them
    pub async fn submit(
        &self,
        code: Option<String>,
        language: Option<&str>,
        input: Option<String>,
    ) -> Result<ExecutionResult> {
        let request =
            ExecutionRequest::from_submission(code, language, input, self.config.strict_languages)?;
        self.execute(request).await
    }

    /// Execute a request.
    ///
    /// `Err` means the request was invalid or the harness failed; a program
    /// that fails or times out is an `Ok` result with `success == false`.
    #[instrument(skip_all, fields(language = %request.language))]
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        request.validate()?;

        let workspace = Workspace::materialize(&self.config.scratch_dir, &request).await?;
        debug!("Workspace {} ready", workspace.id());

        let launched = self.launch(request.language, &workspace).await;

        // Runs on every path; an early return above drops the workspace instead
        workspace.cleanup().await;

        let output = launched?;
        let limit = profile_for(&self.config, request.language).timeout();
        let result = collect(output, limit);

        info!(
            "Execution finished: success={} timed_out={} time={}ms",
            result.success,
            result.timed_out,
            result.execution_time_ms()
        );

        Ok(result)
    }

    async fn launch(
        &self,
        language: Language,
        workspace: &Workspace,
    ) -> Result<sandbox::ProcessOutput> {
        let plan = ContainerPlan::build(language, workspace, &self.config)?;
        debug!("Launching {} with {}", plan.name, self.executor.name());
        self.executor.execute(&plan).await
    }
}
