//! Configuration module
//!
//! - types/mod.rs: Core configuration types (Config, ServerConfig)
//! - types/sandbox.rs: Sandbox backend and language profiles
//! - io.rs: Configuration loading
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{Config, ServerConfig};

// Re-export sandbox types
pub use types::sandbox::{LanguageProfile, SandboxBackend, SandboxConfig};

// Re-export IO and utilities
pub use io::{
    apply_env_overrides, apply_overrides, load_config, load_config_from_path,
    read_config_snapshot, ConfigSnapshot,
};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
