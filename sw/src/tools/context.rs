//! ToolContext - execution context for tools

use memstore::MemoryStore;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::ToolError;
use crate::sandbox::{CommandRunner, normalize_path};

/// Execution context for tools - scoped to one session's working root
///
/// Every path a tool touches must resolve inside `working_root`. `cwd` is
/// where relative paths start; the registry narrows it per call when the
/// model passes its own `working_root` argument.
#[derive(Clone)]
pub struct ToolContext {
    /// Confinement root for every file and command operation
    pub working_root: PathBuf,

    /// Directory relative paths resolve against
    pub cwd: PathBuf,

    pub runner: CommandRunner,

    pub memory: Arc<MemoryStore>,

    /// Files read this session (for edit validation)
    read_files: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ToolContext {
    pub fn new(runner: CommandRunner, memory: Arc<MemoryStore>) -> Self {
        let working_root = runner.root().to_path_buf();
        debug!(?working_root, "ToolContext::new: called");
        Self {
            cwd: working_root.clone(),
            working_root,
            runner,
            memory,
            read_files: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Context with the default runner and memory for `root`
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let memory = Arc::new(MemoryStore::open(&root));
        Self::new(CommandRunner::new(root), memory)
    }

    /// Same context with relative paths resolved under `dir`
    ///
    /// Read tracking is shared with the parent context.
    pub fn scoped(&self, dir: PathBuf) -> Self {
        debug!(?dir, "ToolContext::scoped: called");
        Self {
            cwd: dir,
            ..self.clone()
        }
    }

    /// Track that a file was read (enables edit validation)
    pub async fn track_read(&self, path: &Path) {
        let mut read_files = self.read_files.lock().await;
        read_files.insert(canonicalize_existing_prefix(&self.resolve(path)));
    }

    /// Check if a file was read (required before edit)
    pub async fn was_read(&self, path: &Path) -> bool {
        let read_files = self.read_files.lock().await;
        read_files.contains(&canonicalize_existing_prefix(&self.resolve(path)))
    }

    /// Absolute, lexically normalized form of `path`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.cwd.join(path))
        }
    }

    /// Display `path` relative to the working root when possible
    pub fn display_path(&self, path: &Path) -> String {
        let root = self.working_root.canonicalize().unwrap_or_else(|_| self.working_root.clone());
        path.strip_prefix(&root)
            .or_else(|_| path.strip_prefix(&self.working_root))
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Validate path is within the working root (sandbox enforcement)
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        debug!(?path, "ToolContext::validate_path: called");
        let normalized = self.resolve(path);

        // existing paths are canonicalized to see through symlinks; new
        // paths go through their nearest existing ancestor
        let canonical = canonicalize_existing_prefix(&normalized);
        let root_canonical = self.working_root.canonicalize().unwrap_or_else(|_| self.working_root.clone());

        if canonical.starts_with(&root_canonical) || canonical.starts_with(&self.working_root) {
            Ok(canonical)
        } else {
            debug!(?canonical, "ToolContext::validate_path: sandbox violation detected");
            Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                root: self.working_root.clone(),
            })
        }
    }
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    resolved
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("working_root", &self.working_root)
            .field("cwd", &self.cwd)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_track_and_check_read() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let file_path = Path::new("src/lib.rs");
        assert!(!ctx.was_read(file_path).await);

        ctx.track_read(file_path).await;
        assert!(ctx.was_read(file_path).await);
        assert!(ctx.was_read(&temp.path().join("src/./lib.rs")).await);
    }

    #[tokio::test]
    async fn test_scoped_shares_reads() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());
        let scoped = ctx.scoped(temp.path().join("pkg"));

        scoped.track_read(Path::new("mod.py")).await;
        assert!(ctx.was_read(Path::new("pkg/mod.py")).await);
    }

    #[test]
    fn test_validate_path_within_root() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "content").unwrap();
        let ctx = ToolContext::for_root(temp.path());

        assert!(ctx.validate_path(Path::new("test.txt")).is_ok());
        assert!(ctx.validate_path(Path::new("new/dir/file.txt")).is_ok());
    }

    #[test]
    fn test_validate_path_outside_root() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = ctx.validate_path(Path::new("/etc/passwd"));
        assert!(matches!(result.unwrap_err(), ToolError::SandboxViolation { .. }));

        let result = ctx.validate_path(Path::new("../outside.txt"));
        assert!(matches!(result.unwrap_err(), ToolError::SandboxViolation { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_path_symlink_escape() {
        let temp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();
        let ctx = ToolContext::for_root(temp.path());

        assert!(ctx.validate_path(Path::new("link/file.txt")).is_err());
    }
}
