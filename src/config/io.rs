//! Configuration I/O - Loading configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// A snapshot of the configuration file
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Path to the config file
    pub path: std::path::PathBuf,
    /// Whether the file exists
    pub exists: bool,
    /// Problems reading or parsing the file
    pub issues: Vec<String>,
}

/// Load configuration with layered precedence:
/// 1. Config file (config.json / config.toml) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides (highest precedence)
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply process environment overrides to an existing config.
///
/// Loads `.env` first, then overlays any set variables. Env vars have the
/// highest precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Unparsable values are ignored and the previous setting is kept.
pub fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Server overrides
    if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Some(bind) = var("BIND") {
        config.server.bind = bind;
    }
    if let Some(origin) = var("CLIENT_URL") {
        config.server.cors_origin = Some(origin);
    }

    // Sandbox overrides
    if let Some(backend) = var("CODERUN_BACKEND").and_then(|b| b.parse().ok()) {
        config.sandbox.backend = backend;
    }
    if let Some(dir) = var("CODERUN_SCRATCH_DIR") {
        config.sandbox.scratch_dir = std::path::PathBuf::from(dir);
    }
    if let Some(binary) = var("CODERUN_DOCKER_BINARY") {
        config.sandbox.docker_binary = binary;
    }
    if let Some(strict) = var("CODERUN_STRICT_LANGUAGES") {
        config.sandbox.strict_languages = strict == "true" || strict == "1";
    }
    if let Some(image) = var("CODERUN_JS_IMAGE") {
        config.sandbox.javascript.image = image;
    }
    if let Some(image) = var("CODERUN_JAVA_IMAGE") {
        config.sandbox.java.image = image;
    }
}

/// Read a configuration file into a snapshot
pub fn read_config_snapshot(path: &Path) -> ConfigSnapshot {
    if !path.exists() {
        return ConfigSnapshot {
            path: path.to_path_buf(),
            exists: false,
            issues: vec!["Configuration file does not exist, using defaults".to_string()],
        };
    }

    match load_config_from_path(path) {
        Ok(_) => ConfigSnapshot {
            path: path.to_path_buf(),
            exists: true,
            issues: Vec::new(),
        },
        Err(e) => ConfigSnapshot {
            path: path.to_path_buf(),
            exists: true,
            issues: vec![e.to_string()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxBackend;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_load_json5_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            "{\n  // comments are allowed\n  sandbox: { java: { image: 'openjdk:11-jdk-slim', memory_limit: '256m', cpu_limit: 0.5, tmpfs_size: '20m', tmpfs_exec: true, timeout_secs: 20 } },\n}\n",
        )
        .unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.sandbox.java.timeout_secs, 20);
        assert_eq!(loaded.sandbox.javascript.timeout_secs, 10);
        assert_eq!(loaded.server.port, 4000);
    }

    #[test]
    fn test_load_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8080\n\n[sandbox]\nbackend = \"cli\"\nhost_grace = \"2s\"\n",
        )
        .unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.sandbox.backend, SandboxBackend::Cli);
        assert_eq!(loaded.sandbox.host_grace, std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("CLIENT_URL", "https://ide.example.com"),
            ("CODERUN_BACKEND", "cli"),
            ("CODERUN_STRICT_LANGUAGES", "1"),
            ("CODERUN_JAVA_IMAGE", "eclipse-temurin:17-jdk"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origin.as_deref(), Some("https://ide.example.com"));
        assert_eq!(config.sandbox.backend, SandboxBackend::Cli);
        assert!(config.sandbox.strict_languages);
        assert_eq!(config.sandbox.java.image, "eclipse-temurin:17-jdk");
        assert_eq!(config.sandbox.javascript.image, "node:18-alpine");
    }

    #[test]
    fn test_bad_override_is_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, |key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_snapshot_of_missing_file() {
        let dir = tempdir().unwrap();
        let snapshot = read_config_snapshot(&dir.path().join("missing.json"));
        assert!(!snapshot.exists);
        assert_eq!(snapshot.issues.len(), 1);
    }

    #[test]
    fn test_snapshot_reports_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let snapshot = read_config_snapshot(&path);
        assert!(snapshot.exists);
        assert_eq!(snapshot.issues.len(), 1);
        assert!(snapshot.issues[0].contains("TOML"));
    }
}
