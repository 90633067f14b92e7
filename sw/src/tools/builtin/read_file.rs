//! read_file tool - read file contents with line numbers

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolResult};

const MAX_LINE_CHARS: usize = 2000;

/// Read a file's contents with line numbers
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a file's contents with line numbers. Required before edit_file."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the working root"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max lines to read (default: 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(&input, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let offset = input["offset"].as_u64().unwrap_or(1).max(1) as usize;
        let limit = input["limit"].as_u64().unwrap_or(2000) as usize;

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        ctx.track_read(&full_path).await;

        let lines: Vec<String> = content
            .lines()
            .skip(offset - 1)
            .take(limit)
            .enumerate()
            .map(|(i, line)| {
                let shown = if line.chars().count() > MAX_LINE_CHARS {
                    format!("{}...", line.chars().take(MAX_LINE_CHARS).collect::<String>())
                } else {
                    line.to_string()
                };
                format!("{:>6}│{}", offset + i, shown)
            })
            .collect();

        if lines.is_empty() {
            return ToolResult::success("(empty file)");
        }
        ToolResult::success(lines.join("\n"))
    }
}
