//! Error types for coderun

use thiserror::Error;

/// Result type alias using coderun's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for coderun
///
/// Program-level failures (non-zero exit, timeout) are not errors: they are
/// reported inside [`crate::sandbox::ExecutionResult`]. Everything here is
/// either a rejected request or a failure of the harness itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The isolation layer could not run the program
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// Docker/container error
    #[error("Container error: {0}")]
    Container(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Check if the isolation facility itself failed
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::Sandbox(_) | Error::Container(_))
    }

    /// Message safe to hand back to a client
    ///
    /// Validation messages are returned as-is; anything else is collapsed
    /// into a generic message so host details never leak.
    pub fn public_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(err: bollard::errors::Error) -> Self {
        Error::Container(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let invalid = Error::InvalidInput("No code provided".to_string());
        assert!(invalid.is_client_error());
        assert!(!invalid.is_infrastructure());
        assert_eq!(invalid.public_message(), "No code provided");

        let sandbox = Error::Sandbox("docker not found".to_string());
        assert!(!sandbox.is_client_error());
        assert!(sandbox.is_infrastructure());
        assert_eq!(sandbox.public_message(), "Internal server error");
    }
}
