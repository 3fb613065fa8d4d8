//! Configuration validation
//!
//! Validates configuration and reports issues.

use super::types::sandbox::LanguageProfile;
use super::types::Config;
use crate::sandbox::parse_size;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_profile("sandbox.javascript", &config.sandbox.javascript, result);
    result = validate_profile("sandbox.java", &config.sandbox.java, result);
    result = validate_sandbox_config(config, result);

    result
}

fn validate_profile(
    path: &str,
    profile: &LanguageProfile,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    if profile.image.trim().is_empty() {
        result = result.with_error(
            ValidationIssue::new(format!("{}.image", path), "No image specified")
                .with_suggestion("Set a Docker image containing the language runtime"),
        );
    }

    if profile.timeout_secs == 0 {
        result = result.with_error(ValidationIssue::new(
            format!("{}.timeout_secs", path),
            "Timeout must be at least one second",
        ));
    }

    if parse_size(&profile.memory_limit).map_or(true, |bytes| bytes <= 0) {
        result = result.with_error(
            ValidationIssue::new(
                format!("{}.memory_limit", path),
                format!("Invalid memory limit: {}", profile.memory_limit),
            )
            .with_suggestion("Use a size such as \"128m\" or \"1g\""),
        );
    }

    if parse_size(&profile.tmpfs_size).map_or(true, |bytes| bytes <= 0) {
        result = result.with_error(ValidationIssue::new(
            format!("{}.tmpfs_size", path),
            format!("Invalid tmpfs size: {}", profile.tmpfs_size),
        ));
    }

    if !(profile.cpu_limit > 0.0) {
        result = result.with_error(ValidationIssue::new(
            format!("{}.cpu_limit", path),
            "CPU limit must be positive",
        ));
    }

    result
}

fn validate_sandbox_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    use super::types::sandbox::SandboxBackend;

    if !config.sandbox.scratch_dir.is_absolute() {
        result = result.with_warning(
            ValidationIssue::new(
                "sandbox.scratch_dir",
                format!(
                    "Scratch directory is relative: {}",
                    config.sandbox.scratch_dir.display()
                ),
            )
            .with_suggestion("Bind mounts need absolute host paths; it will be resolved against the working directory"),
        );
    }

    if config.sandbox.backend == SandboxBackend::Cli
        && which::which(&config.sandbox.docker_binary).is_err()
    {
        result = result.with_warning(
            ValidationIssue::new(
                "sandbox.docker_binary",
                format!("{} not found on PATH", config.sandbox.docker_binary),
            )
            .with_suggestion("Install the Docker CLI or set sandbox.docker_binary"),
        );
    }

    if config.sandbox.pids_limit <= 0 {
        result = result.with_warning(ValidationIssue::new(
            "sandbox.pids_limit",
            "No process limit; fork bombs are only bounded by memory",
        ));
    }

    if config.sandbox.max_output_bytes == 0 {
        result = result.with_error(ValidationIssue::new(
            "sandbox.max_output_bytes",
            "Output limit must be positive",
        ));
    }

    result
}
