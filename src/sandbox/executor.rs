//! Common executor trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::sandbox::collector::ProcessOutput;
use crate::sandbox::profile::ContainerPlan;

/// Supported programming languages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    JavaScript,
    Java,
}

impl Language {
    /// Resolve a caller-supplied language name.
    ///
    /// A missing name means JavaScript. Unknown names also run as JavaScript
    /// unless `strict` is set, in which case they are rejected.
    pub fn resolve(name: Option<&str>, strict: bool) -> Result<Self> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(Language::JavaScript),
            Some(name) => match name.parse() {
                Ok(language) => Ok(language),
                Err(e) if strict => Err(e),
                Err(_) => {
                    debug!("Unknown language {:?}, falling back to javascript", name);
                    Ok(Language::JavaScript)
                }
            },
        }
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            _ => Err(Error::InvalidInput(format!("Unsupported language: {}", s))),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::JavaScript => write!(f, "javascript"),
            Language::Java => write!(f, "java"),
        }
    }
}

/// Request to execute code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The code to execute
    pub code: String,
    /// Programming language
    #[serde(default)]
    pub language: Language,
    /// Standard input, only fed to Java programs
    #[serde(default)]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    /// Create a new execution request
    pub fn new(code: impl Into<String>, language: Language) -> Self {
        ExecutionRequest {
            code: code.into(),
            language,
            stdin: None,
        }
    }

    /// Build a request from raw submission fields, rejecting blank code.
    pub fn from_submission(
        code: Option<String>,
        language: Option<&str>,
        input: Option<String>,
        strict_languages: bool,
    ) -> Result<Self> {
        let code = code.unwrap_or_default();
        let request = ExecutionRequest {
            code,
            language: Language::resolve(language, strict_languages)?,
            stdin: input,
        };
        request.validate()?;
        Ok(request)
    }

    /// Set stdin
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Reject requests whose code is empty after trimming
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(Error::InvalidInput("No code provided".to_string()));
        }
        Ok(())
    }

    /// Stdin that will actually be handed to the program
    pub fn effective_stdin(&self) -> Option<&str> {
        match self.language {
            Language::Java => self.stdin.as_deref().filter(|s| !s.trim().is_empty()),
            Language::JavaScript => None,
        }
    }
}

/// Result of code execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether execution was successful
    pub success: bool,
    /// Exit code (if the program exited on its own)
    pub exit_code: Option<i64>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Classified failure message
    pub error: Option<String>,
    /// Execution time
    #[serde(with = "humantime_serde")]
    pub execution_time: Duration,
    /// Was execution terminated due to timeout?
    pub timed_out: bool,
    /// Was any output dropped because of the size cap?
    pub truncated: bool,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(stdout: String, stderr: String, execution_time: Duration) -> Self {
        ExecutionResult {
            success: true,
            exit_code: Some(0),
            stdout,
            stderr,
            error: None,
            execution_time,
            timed_out: false,
            truncated: false,
        }
    }

    /// Create a failure result
    pub fn failure(
        stdout: String,
        stderr: String,
        exit_code: Option<i64>,
        message: String,
        execution_time: Duration,
    ) -> Self {
        ExecutionResult {
            success: false,
            exit_code,
            stdout,
            stderr,
            error: Some(message),
            execution_time,
            timed_out: false,
            truncated: false,
        }
    }

    /// Create a timeout result
    pub fn timeout(
        partial_stdout: String,
        partial_stderr: String,
        limit: Duration,
        execution_time: Duration,
    ) -> Self {
        ExecutionResult {
            success: false,
            exit_code: None,
            stdout: partial_stdout,
            stderr: partial_stderr,
            error: Some(timeout_message(limit)),
            execution_time,
            timed_out: true,
            truncated: false,
        }
    }

    /// Elapsed wall-clock time in milliseconds
    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time.as_millis() as u64
    }

    /// Text for the caller's `error` field: the classified message on
    /// failure, non-empty stderr on success.
    pub fn error_text(&self) -> Option<String> {
        if self.success {
            (!self.stderr.is_empty()).then(|| self.stderr.clone())
        } else {
            self.error.clone()
        }
    }
}

/// Message reported when a program exceeds its wall-clock budget
pub fn timeout_message(limit: Duration) -> String {
    format!("Code execution timed out ({}s limit)", limit.as_secs())
}

/// Trait for sandbox launch backends
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Get the executor name
    fn name(&self) -> &str;

    /// Run one container to completion (or until the host deadline) and
    /// return whatever it produced. Errors mean the isolation layer itself
    /// failed; program failures come back as a normal [`ProcessOutput`].
    async fn execute(&self, plan: &ContainerPlan) -> Result<ProcessOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("javascript".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("JS".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("java".parse::<Language>().unwrap(), Language::Java);
        assert!("python".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_resolution() {
        assert_eq!(Language::resolve(None, false).unwrap(), Language::JavaScript);
        assert_eq!(Language::resolve(Some("  "), true).unwrap(), Language::JavaScript);
        assert_eq!(Language::resolve(Some("java"), true).unwrap(), Language::Java);
        assert_eq!(Language::resolve(Some("ruby"), false).unwrap(), Language::JavaScript);

        let err = Language::resolve(Some("ruby"), true).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_blank_code_is_rejected() {
        for code in [None, Some(String::new()), Some("  \n\t ".to_string())] {
            let err = ExecutionRequest::from_submission(code, Some("java"), None, false).unwrap_err();
            assert!(err.is_client_error());
            assert_eq!(err.public_message(), "No code provided");
        }
    }

    #[test]
    fn test_submission_defaults() {
        let req = ExecutionRequest::from_submission(
            Some("console.log(1)".to_string()),
            None,
            Some("ignored".to_string()),
            false,
        )
        .unwrap();
        assert_eq!(req.language, Language::JavaScript);
        assert_eq!(req.effective_stdin(), None);
    }

    #[test]
    fn test_effective_stdin() {
        let java = ExecutionRequest::new("class A {}", Language::Java).with_stdin("3\n4\n");
        assert_eq!(java.effective_stdin(), Some("3\n4\n"));

        let blank = ExecutionRequest::new("class A {}", Language::Java).with_stdin(" \n");
        assert_eq!(blank.effective_stdin(), None);
    }

    #[test]
    fn test_execution_result() {
        let ok = ExecutionResult::success("out".to_string(), String::new(), Duration::from_millis(12));
        assert!(ok.success);
        assert_eq!(ok.error_text(), None);
        assert_eq!(ok.execution_time_ms(), 12);

        let noisy = ExecutionResult::success("out".to_string(), "warn".to_string(), Duration::ZERO);
        assert_eq!(noisy.error_text().as_deref(), Some("warn"));

        let timeout = ExecutionResult::timeout(
            "partial".to_string(),
            String::new(),
            Duration::from_secs(10),
            Duration::from_secs(10),
        );
        assert!(!timeout.success);
        assert!(timeout.timed_out);
        assert_eq!(
            timeout.error_text().as_deref(),
            Some("Code execution timed out (10s limit)")
        );
    }
}
