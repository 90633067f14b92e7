//! edit_file tool - exact string replacement

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

/// Replace an exact string in a previously read file
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Replace an exact string in a file. The file must have been read with read_file first, \
         and old_string must be unique unless replace_all is set."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working root"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact string to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement string"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("EditFileTool::execute: called");
        let (path, old_string, new_string) = match (
            require_str(&input, "path"),
            require_str(&input, "old_string"),
            require_str(&input, "new_string"),
        ) {
            (Ok(p), Ok(o), Ok(n)) => (p, o, n),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return e,
        };
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        if old_string.is_empty() {
            return ToolResult::error("old_string must not be empty");
        }

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        if !ctx.was_read(&full_path).await {
            debug!("EditFileTool::execute: file not read before editing");
            return ToolError::EditWithoutRead { path: path.to_string() }.into();
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        let count = content.matches(old_string).count();
        if count == 0 {
            return ToolResult::error(
                "old_string not found in file. Make sure it matches exactly including whitespace.",
            );
        }
        if count > 1 && !replace_all {
            return ToolResult::error(format!(
                "old_string found {} times. Use replace_all=true or provide more context.",
                count
            ));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        if let Err(e) = tokio::fs::write(&full_path, updated).await {
            return ToolResult::error(format!("Failed to write file: {}", e));
        }

        let replaced = if replace_all { count } else { 1 };
        ToolResult::success(format!(
            "Replaced {} occurrence(s) in {}",
            replaced,
            ctx.display_path(&full_path)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::ReadFileTool;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_edit_requires_read() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "x = 1\n").unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = EditFileTool
            .execute(json!({"path": "a.py", "old_string": "1", "new_string": "2"}), &ctx)
            .await;

        assert!(result.is_error);
        assert!(result.content.contains("Must read file before editing"));
    }

    #[tokio::test]
    async fn test_edit_after_read() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "x = 1\ny = 1\n").unwrap();
        let ctx = ToolContext::for_root(temp.path());
        ReadFileTool.execute(json!({"path": "a.py"}), &ctx).await;

        let ambiguous = EditFileTool
            .execute(json!({"path": "a.py", "old_string": "= 1", "new_string": "= 2"}), &ctx)
            .await;
        assert!(ambiguous.is_error);
        assert!(ambiguous.content.contains("found 2 times"));

        let result = EditFileTool
            .execute(json!({"path": "a.py", "old_string": "x = 1", "new_string": "x = 2"}), &ctx)
            .await;
        assert!(!result.is_error, "{}", result.content);
        assert_eq!(fs::read_to_string(temp.path().join("a.py")).unwrap(), "x = 2\ny = 1\n");
    }

    #[tokio::test]
    async fn test_edit_replace_all() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "a a a").unwrap();
        let ctx = ToolContext::for_root(temp.path());
        ReadFileTool.execute(json!({"path": "a.py"}), &ctx).await;

        let result = EditFileTool
            .execute(
                json!({"path": "a.py", "old_string": "a", "new_string": "b", "replace_all": true}),
                &ctx,
            )
            .await;
        assert_eq!(result.content, "Replaced 3 occurrence(s) in a.py");
        assert_eq!(fs::read_to_string(temp.path().join("a.py")).unwrap(), "b b b");
    }
}
