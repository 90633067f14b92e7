//! list_files tool - find files matching a glob pattern

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolResult};

const MAX_MATCHES: usize = 1000;

/// Find files matching a glob pattern
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern (e.g. **/*.py), relative to the working root."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match"
                },
                "path": {
                    "type": "string",
                    "description": "Base directory (default: working root)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ListFilesTool::execute: called");
        let pattern = match require_str(&input, "pattern") {
            Ok(p) => p,
            Err(e) => return e,
        };
        if pattern.contains("..") {
            return ToolResult::error("BLOCKED: pattern must not contain '..'");
        }

        let base = input["path"].as_str().unwrap_or(".");
        let base_path = match ctx.validate_path(Path::new(base)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };

        let full_pattern = base_path.join(pattern);
        let Some(pattern_str) = full_pattern.to_str() else {
            return ToolResult::error("Invalid pattern path");
        };

        let paths = match glob::glob(pattern_str) {
            Ok(paths) => paths,
            Err(e) => return ToolResult::error(format!("Invalid glob pattern: {}", e)),
        };

        let mut matches: Vec<String> = paths
            .filter_map(|r| r.ok())
            .filter(|p| ctx.validate_path(p).is_ok())
            .map(|p| ctx.display_path(&p))
            .take(MAX_MATCHES)
            .collect();
        matches.sort();
        debug!(matches_count = %matches.len(), "ListFilesTool::execute: matches found");

        if matches.is_empty() {
            ToolResult::success("No matches found")
        } else {
            ToolResult::success(matches.join("\n"))
        }
    }
}
