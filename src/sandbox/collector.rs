//! Result collection and failure classification

use std::time::Duration;
use tracing::{debug, warn};

use crate::sandbox::executor::ExecutionResult;

/// Exit status conventionally returned by `timeout(1)` when it fires
pub const TIMEOUT_EXIT_CODE: i64 = 124;

/// Marker appended to a stream that hit the output cap
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

/// Raw outcome of one container run, before classification
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` if the host had to kill the container
    pub exit_code: Option<i64>,
    /// Captured standard output (possibly partial)
    pub stdout: String,
    /// Captured standard error (possibly partial)
    pub stderr: String,
    /// Wall clock from launch until exit or kill
    pub elapsed: Duration,
    /// The host-side deadline fired before the container exited
    pub host_timed_out: bool,
    /// Some output was dropped by the cap
    pub truncated: bool,
}

/// Byte buffer that keeps at most `max` bytes and remembers what it dropped
#[derive(Debug)]
pub struct OutputBuffer {
    buf: Vec<u8>,
    max: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(max: usize) -> Self {
        OutputBuffer {
            buf: Vec::new(),
            max,
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.max.saturating_sub(self.buf.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Lossy UTF-8 text, with the marker appended if anything was dropped
    pub fn into_string(self) -> String {
        let mut text = String::from_utf8_lossy(&self.buf).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout,
    ProgramError(String),
}

/// Classify a raw outcome against the language's wall-clock limit.
///
/// Exit 124 is the in-container `timeout` firing. 137/143 are SIGKILL and
/// SIGTERM; some `timeout` builds report those instead, so they count as a
/// timeout once the limit has actually elapsed.
pub fn classify(output: &ProcessOutput, limit: Duration) -> Outcome {
    if output.host_timed_out {
        return Outcome::Timeout;
    }

    match output.exit_code {
        Some(0) => Outcome::Success,
        Some(TIMEOUT_EXIT_CODE) => Outcome::Timeout,
        Some(137) | Some(143) if output.elapsed >= limit => Outcome::Timeout,
        Some(code) if output.stderr.is_empty() => {
            Outcome::ProgramError(format!("Execution failed (exit code {})", code))
        }
        None if output.stderr.is_empty() => {
            Outcome::ProgramError("Execution failed".to_string())
        }
        _ => Outcome::ProgramError(output.stderr.clone()),
    }
}

/// Turn a raw outcome into the caller-facing result
pub fn collect(output: ProcessOutput, limit: Duration) -> ExecutionResult {
    let outcome = classify(&output, limit);
    let truncated = output.truncated;

    let mut result = match outcome {
        Outcome::Success => {
            debug!("Program exited cleanly in {:?}", output.elapsed);
            ExecutionResult::success(output.stdout, output.stderr, output.elapsed)
        }
        Outcome::Timeout => {
            warn!("Program exceeded its {}s limit", limit.as_secs());
            ExecutionResult::timeout(output.stdout, output.stderr, limit, output.elapsed)
        }
        Outcome::ProgramError(message) => {
            debug!("Program failed with exit code {:?}", output.exit_code);
            ExecutionResult::failure(
                output.stdout,
                output.stderr,
                output.exit_code,
                message,
                output.elapsed,
            )
        }
    };
    result.truncated = truncated;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(10);

    fn output(exit_code: Option<i64>, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code,
            stdout: "partial".to_string(),
            stderr: stderr.to_string(),
            elapsed: Duration::from_millis(300),
            ..Default::default()
        }
    }

    #[test]
    fn test_success() {
        let result = collect(output(Some(0), ""), LIMIT);
        assert!(result.success);
        assert_eq!(result.stdout, "partial");
        assert_eq!(result.error_text(), None);
        assert_eq!(result.execution_time_ms(), 300);
    }

    #[test]
    fn test_timeout_exit_code() {
        let result = collect(output(Some(124), ""), LIMIT);
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.stdout, "partial");
        assert_eq!(result.error.as_deref(), Some("Code execution timed out (10s limit)"));
    }

    #[test]
    fn test_host_deadline() {
        let mut out = output(None, "");
        out.host_timed_out = true;
        assert_eq!(classify(&out, Duration::from_secs(15)), Outcome::Timeout);
    }

    #[test]
    fn test_signal_exit_needs_elapsed_limit() {
        let mut out = output(Some(137), "");
        assert_eq!(
            classify(&out, LIMIT),
            Outcome::ProgramError("Execution failed (exit code 137)".to_string())
        );

        out.elapsed = Duration::from_secs(10);
        assert_eq!(classify(&out, LIMIT), Outcome::Timeout);
    }

    #[test]
    fn test_stderr_is_surfaced_verbatim() {
        let stderr = "Adder.java:3: error: ';' expected\n";
        let result = collect(output(Some(1), stderr), LIMIT);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(stderr));
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_generic_failure() {
        assert_eq!(
            classify(&output(None, ""), LIMIT),
            Outcome::ProgramError("Execution failed".to_string())
        );
    }

    #[test]
    fn test_whitespace_stderr_is_still_surfaced() {
        assert_eq!(
            classify(&output(Some(2), "\n"), LIMIT),
            Outcome::ProgramError("\n".to_string())
        );
    }

    #[test]
    fn test_output_buffer_cap() {
        let mut buf = OutputBuffer::new(5);
        buf.push(b"abc");
        buf.push(b"defgh");
        buf.push(b"ij");
        assert!(buf.is_truncated());
        assert_eq!(buf.into_string(), format!("abcde{}", TRUNCATION_MARKER));

        let mut exact = OutputBuffer::new(3);
        exact.push(b"abc");
        assert!(!exact.is_truncated());
        assert_eq!(exact.into_string(), "abc");
    }
}
