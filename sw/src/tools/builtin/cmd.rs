//! Command tools - everything here goes through the sandboxed runner

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{quote_args, require_str};
use crate::tools::{Tool, ToolContext, ToolResult};

/// Run an allowlisted shell command inside the working root
pub struct RunCmdTool;

#[async_trait]
impl Tool for RunCmdTool {
    fn name(&self) -> &'static str {
        "run_cmd"
    }

    fn description(&self) -> &'static str {
        "Run a shell command inside the working root. Only allowlisted commands are accepted; \
         network access, privilege escalation, and paths outside the root are blocked."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 60, max 300)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "RunCmdTool::execute: called");
        let command = match require_str(&input, "command") {
            Ok(c) => c,
            Err(e) => return e,
        };
        let timeout = input["timeout"].as_u64();
        ToolResult::from_command(ctx.runner.run_text(command, &ctx.cwd, timeout).await)
    }
}

/// Apply a unified diff with `git apply`
pub struct ApplyPatchTool;

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &'static str {
        "apply_patch"
    }

    fn description(&self) -> &'static str {
        "Apply a unified diff to the working tree using git apply."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patch": {
                    "type": "string",
                    "description": "Unified diff text"
                },
                "check": {
                    "type": "boolean",
                    "description": "Only check whether the patch applies (default false)"
                }
            },
            "required": ["patch"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("ApplyPatchTool::execute: called");
        let patch = match require_str(&input, "patch") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let check = input["check"].as_bool().unwrap_or(false);

        let patch_file = ctx.working_root.join(format!(".stepwise-{}.patch", Uuid::now_v7()));
        let mut body = patch.to_string();
        if !body.ends_with('\n') {
            body.push('\n');
        }
        if let Err(e) = tokio::fs::write(&patch_file, body).await {
            return ToolResult::error(format!("Failed to write patch file: {}", e));
        }

        let patch_arg = patch_file.to_string_lossy();
        let mut args = vec!["git", "apply", "--whitespace=nowarn"];
        if check {
            args.push("--check");
        }
        args.push(patch_arg.as_ref());

        let result = match quote_args(args) {
            Ok(command) => ToolResult::from_command(ctx.runner.run_text(&command, &ctx.cwd, None).await),
            Err(e) => e,
        };

        if let Err(e) = tokio::fs::remove_file(&patch_file).await {
            warn!(path = %patch_file.display(), error = %e, "Failed to remove patch file");
        }
        result
    }
}

/// Run the project's tests with pytest
pub struct RunPytestTool;

#[async_trait]
impl Tool for RunPytestTool {
    fn name(&self) -> &'static str {
        "run_pytest"
    }

    fn description(&self) -> &'static str {
        "Run pytest (quiet mode) in the working root, optionally with extra arguments such as a test path or -k filter."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "string",
                    "description": "Extra pytest arguments, e.g. 'tests/test_api.py -k login'"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 60, max 300)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "RunPytestTool::execute: called");
        let command = match input["args"].as_str().map(str::trim) {
            Some(args) if !args.is_empty() => format!("pytest -q {}", args),
            _ => "pytest -q".to_string(),
        };
        let timeout = input["timeout"].as_u64();
        ToolResult::from_command(ctx.runner.run_text(&command, &ctx.cwd, timeout).await)
    }
}
