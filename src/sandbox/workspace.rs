//! Per-request scratch workspace
//!
//! Every execution gets its own directory under the scratch area, named by a
//! timestamp plus a random suffix. The directory holds the source file and,
//! for Java, the optional stdin file. It is removed exactly once, either by
//! [`Workspace::cleanup`] or, if the request is abandoned early, on drop.
//! Inside a runtime the drop path hands the removal to the blocking pool.

use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::sandbox::executor::{ExecutionRequest, Language};

/// Source file name used for JavaScript
pub const JS_FILE_NAME: &str = "code.js";

/// Stdin file name
pub const STDIN_FILE_NAME: &str = "input.txt";

/// Class name used when the source declares no public class
pub const DEFAULT_JAVA_CLASS: &str = "Main";

/// Temporary files backing one execution
#[derive(Debug)]
pub struct Workspace {
    id: String,
    dir: PathBuf,
    source_name: String,
    class_name: Option<String>,
    has_stdin: bool,
    removed: bool,
}

impl Workspace {
    /// Write the request's files under `scratch_dir`.
    ///
    /// On error nothing is left behind: the partially written directory is
    /// removed when the half-built workspace drops.
    pub async fn materialize(scratch_dir: &Path, request: &ExecutionRequest) -> Result<Self> {
        tokio::fs::create_dir_all(scratch_dir).await?;
        // Bind mounts need an absolute host path
        let scratch_dir = tokio::fs::canonicalize(scratch_dir).await?;

        let id = generate_workspace_id();
        let dir = scratch_dir.join(&id);
        tokio::fs::create_dir(&dir).await?;

        let (source_name, class_name) = match request.language {
            Language::Java => {
                let class = java_class_name(&request.code);
                (format!("{}.java", class), Some(class))
            }
            Language::JavaScript => (JS_FILE_NAME.to_string(), None),
        };

        let mut workspace = Workspace {
            id,
            dir,
            source_name,
            class_name,
            has_stdin: false,
            removed: false,
        };

        set_mode(&workspace.dir, 0o755).await?;

        let source_path = workspace.source_path();
        tokio::fs::write(&source_path, &request.code).await?;
        set_mode(&source_path, 0o644).await?;

        if let Some(stdin) = request.effective_stdin() {
            let stdin_path = workspace.dir.join(STDIN_FILE_NAME);
            tokio::fs::write(&stdin_path, stdin).await?;
            set_mode(&stdin_path, 0o644).await?;
            workspace.has_stdin = true;
        }

        debug!(
            "Materialized workspace {} ({}{})",
            workspace.id,
            workspace.source_name,
            if workspace.has_stdin { " + stdin" } else { "" }
        );

        Ok(workspace)
    }

    /// Unique workspace id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory holding this workspace's files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of the source, which is also its in-container name
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Host path of the source file
    pub fn source_path(&self) -> PathBuf {
        self.dir.join(&self.source_name)
    }

    /// Java class to run
    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    /// Host path of the stdin file, if one was written
    pub fn stdin_path(&self) -> Option<PathBuf> {
        self.has_stdin.then(|| self.dir.join(STDIN_FILE_NAME))
    }

    /// Remove every file of this workspace. Failures are logged, never returned.
    pub async fn cleanup(mut self) {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!("Removed workspace {}", self.id),
            Err(e) => warn!("Failed to remove workspace {}: {}", self.dir.display(), e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        let dir = std::mem::take(&mut self.dir);
        let id = std::mem::take(&mut self.id);
        // Keep the blocking removal off the async worker threads
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(&dir, &id));
            }
            Err(_) => remove_abandoned(&dir, &id),
        }
    }
}

fn remove_abandoned(dir: &Path, id: &str) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!("Removed abandoned workspace {}", id),
        Err(e) => warn!("Failed to remove workspace {}: {}", dir.display(), e),
    }
}

/// Timestamp down to nanoseconds plus eight random characters.
pub fn generate_workspace_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", chrono::Utc::now().format("%Y%m%d%H%M%S%f"), suffix)
}

/// Best-effort sniff of the declared public class, `Main` if none.
pub fn java_class_name(code: &str) -> String {
    static PUBLIC_CLASS: OnceLock<Regex> = OnceLock::new();
    let re = PUBLIC_CLASS
        .get_or_init(|| Regex::new(r"public\s+class\s+(\w+)").expect("valid regex"));

    re.captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_JAVA_CLASS.to_string())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
