//! Directory and path tools - list, create, remove, move

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use tracing::{debug, info};

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolResult};

/// List entries of one directory
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &'static str {
        "list_dir"
    }

    fn description(&self) -> &'static str {
        "List files and directories in a path. Directories end with '/'."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the working root (default: .)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ListDirTool::execute: called");
        let path = input["path"].as_str().unwrap_or(".");

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        let mut dir = match tokio::fs::read_dir(&full_path).await {
            Ok(d) => d,
            Err(e) => return ToolResult::error(format!("Failed to read directory: {}", e)),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(file_type) = entry.file_type().await else {
                debug!(%name, "ListDirTool::execute: no file type, skipping");
                continue;
            };
            let suffix = if file_type.is_dir() { "/" } else { "" };
            entries.push(format!("{}{}", name, suffix));
        }
        entries.sort();

        if entries.is_empty() {
            ToolResult::success("(empty directory)")
        } else {
            ToolResult::success(entries.join("\n"))
        }
    }
}

/// Create a directory and any missing parents
pub struct CreateDirTool;

#[async_trait]
impl Tool for CreateDirTool {
    fn name(&self) -> &'static str {
        "create_dir"
    }

    fn description(&self) -> &'static str {
        "Create a directory (and missing parents) inside the working root."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the working root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "CreateDirTool::execute: called");
        let path = match require_str(&input, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        match tokio::fs::create_dir_all(&full_path).await {
            Ok(()) => ToolResult::success(format!("Created {}", ctx.display_path(&full_path))),
            Err(e) => ToolResult::error(format!("Failed to create directory: {}", e)),
        }
    }
}

/// Delete a file, or a directory when `recursive` is set
pub struct RemovePathTool;

#[async_trait]
impl Tool for RemovePathTool {
    fn name(&self) -> &'static str {
        "remove_path"
    }

    fn description(&self) -> &'static str {
        "Remove a file, or a directory tree when recursive=true. The working root itself cannot be removed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the working root"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Required to remove a directory (default: false)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "RemovePathTool::execute: called");
        let path = match require_str(&input, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let recursive = input["recursive"].as_bool().unwrap_or(false);

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };
        let root = ctx.working_root.canonicalize().unwrap_or_else(|_| ctx.working_root.clone());
        if full_path == root {
            return ToolResult::error("BLOCKED: refusing to remove the working root");
        }

        let metadata = match tokio::fs::symlink_metadata(&full_path).await {
            Ok(m) => m,
            Err(e) => return ToolResult::error(format!("Failed to stat {}: {}", path, e)),
        };

        let removed = if metadata.is_dir() {
            if !recursive {
                return ToolResult::error(format!("{} is a directory; pass recursive=true to remove it", path));
            }
            tokio::fs::remove_dir_all(&full_path).await
        } else {
            tokio::fs::remove_file(&full_path).await
        };

        match removed {
            Ok(()) => {
                info!(path = %ctx.display_path(&full_path), "Removed path");
                ToolResult::success(format!("Removed {}", ctx.display_path(&full_path)))
            }
            Err(e) => ToolResult::error(format!("Failed to remove {}: {}", path, e)),
        }
    }
}

/// Rename or move a path inside the working root
pub struct MovePathTool;

#[async_trait]
impl Tool for MovePathTool {
    fn name(&self) -> &'static str {
        "move_path"
    }

    fn description(&self) -> &'static str {
        "Move or rename a file or directory. Both ends must stay inside the working root."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {
                    "type": "string",
                    "description": "Existing path relative to the working root"
                },
                "destination": {
                    "type": "string",
                    "description": "New path relative to the working root"
                }
            },
            "required": ["source", "destination"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "MovePathTool::execute: called");
        let (source, destination) = match (require_str(&input, "source"), require_str(&input, "destination")) {
            (Ok(s), Ok(d)) => (s, d),
            (Err(e), _) | (_, Err(e)) => return e,
        };

        let (from, to) = match (
            ctx.validate_path(Path::new(source)),
            ctx.validate_path(Path::new(destination)),
        ) {
            (Ok(f), Ok(t)) => (f, t),
            (Err(e), _) | (_, Err(e)) => return e.into(),
        };

        if !from.exists() {
            return ToolResult::error(format!("Source does not exist: {}", source));
        }
        if let Some(parent) = to.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ToolResult::error(format!("Failed to create directories: {}", e));
        }

        match tokio::fs::rename(&from, &to).await {
            Ok(()) => ToolResult::success(format!(
                "Moved {} -> {}",
                ctx.display_path(&from),
                ctx.display_path(&to)
            )),
            Err(e) => ToolResult::error(format!("Failed to move: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_list_dir_sorted_with_suffix() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("b.txt"), "").unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = ListDirTool.execute(json!({}), &ctx).await;
        assert_eq!(result.content, "a.txt\nb.txt\nsrc/");

        fs::create_dir(temp.path().join("empty")).unwrap();
        let result = ListDirTool.execute(json!({"path": "empty"}), &ctx).await;
        assert_eq!(result.content, "(empty directory)");
    }

    #[tokio::test]
    async fn test_create_and_remove_dir() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = CreateDirTool.execute(json!({"path": "a/b/c"}), &ctx).await;
        assert_eq!(result.content, "Created a/b/c");
        assert!(temp.path().join("a/b/c").is_dir());

        let result = RemovePathTool.execute(json!({"path": "a"}), &ctx).await;
        assert!(result.is_error);
        assert!(temp.path().join("a").exists());

        let result = RemovePathTool.execute(json!({"path": "a", "recursive": true}), &ctx).await;
        assert!(!result.is_error, "{}", result.content);
        assert!(!temp.path().join("a").exists());
    }

    #[tokio::test]
    async fn test_remove_root_blocked() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = RemovePathTool.execute(json!({"path": ".", "recursive": true}), &ctx).await;
        assert!(result.is_error);
        assert!(result.content.contains("BLOCKED"));
        assert!(temp.path().exists());
    }

    #[tokio::test]
    async fn test_remove_outside_root_blocked() {
        let temp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("keep.txt"), "x").unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let target = outside.path().join("keep.txt");
        let result = RemovePathTool
            .execute(json!({"path": target.to_string_lossy()}), &ctx)
            .await;
        assert!(result.is_error);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_move_path() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("old.py"), "x").unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = MovePathTool
            .execute(json!({"source": "old.py", "destination": "pkg/new.py"}), &ctx)
            .await;
        assert_eq!(result.content, "Moved old.py -> pkg/new.py");
        assert_eq!(fs::read_to_string(temp.path().join("pkg/new.py")).unwrap(), "x");

        let result = MovePathTool
            .execute(json!({"source": "pkg/new.py", "destination": "../escaped.py"}), &ctx)
            .await;
        assert!(result.is_error);
        assert!(temp.path().join("pkg/new.py").exists());
    }
}
