//! write_file tool - write content to a file

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Write content to a file
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file, replacing it. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working root"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("WriteFileTool::execute: called");
        let path = match require_str(&input, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let content = match require_str(&input, "content") {
            Ok(c) => c,
            Err(e) => return e,
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        if let Some(parent) = full_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ToolResult::error(format!("Failed to create directories: {}", e));
        }

        if let Err(e) = tokio::fs::write(&full_path, content).await {
            return ToolResult::error(format!("Failed to write file: {}", e));
        }

        // the agent knows what it just wrote
        ctx.track_read(&full_path).await;

        ToolResult::success(format!(
            "Wrote {} bytes to {}",
            content.len(),
            ctx.display_path(&full_path)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_file_creates_parents() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = WriteFileTool
            .execute(serde_json::json!({"path": "src/pkg/mod.py", "content": "x = 1\n"}), &ctx)
            .await;

        assert!(!result.is_error, "{}", result.content);
        assert_eq!(result.content, "Wrote 6 bytes to src/pkg/mod.py");
        assert_eq!(fs::read_to_string(temp.path().join("src/pkg/mod.py")).unwrap(), "x = 1\n");
    }

    #[tokio::test]
    async fn test_write_file_escape_blocked() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path().join("inner"));
        fs::create_dir(temp.path().join("inner")).unwrap();

        let result = WriteFileTool
            .execute(serde_json::json!({"path": "../escape.txt", "content": "x"}), &ctx)
            .await;

        assert!(result.is_error);
        assert!(!temp.path().join("escape.txt").exists());
    }
}
