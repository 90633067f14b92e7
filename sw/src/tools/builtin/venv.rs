//! Python virtualenv tools

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{quote_args, require_str};
use crate::tools::{Tool, ToolContext, ToolResult};

/// Memory key holding the active venv
pub const VENV_MEMORY_KEY: &str = "venv_path";

const DEFAULT_VENV_DIR: &str = ".venv";

/// Create a virtualenv and remember where it lives
pub struct CreateVenvTool;

#[async_trait]
impl Tool for CreateVenvTool {
    fn name(&self) -> &'static str {
        "create_venv"
    }

    fn description(&self) -> &'static str {
        "Create a Python virtual environment (python3 -m venv) and record its location in memory as venv_path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Venv directory relative to the working root (default: .venv)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "CreateVenvTool::execute: called");
        let path = input["path"].as_str().unwrap_or(DEFAULT_VENV_DIR);
        let venv_dir = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return e.into(),
        };
        let venv_arg = venv_dir.to_string_lossy();

        let command = match quote_args(["python3", "-m", "venv", venv_arg.as_ref()]) {
            Ok(c) => c,
            Err(e) => return e,
        };
        let result = ToolResult::from_command(ctx.runner.run_text(&command, &ctx.cwd, Some(180)).await);
        if result.is_error {
            return result;
        }

        if let Err(e) = ctx.memory.set(VENV_MEMORY_KEY, &venv_arg) {
            warn!(error = %e, "Failed to record venv path in memory");
            return ToolResult::error(format!("{}\nvenv created but not recorded: {}", result.content, e));
        }
        info!(venv = %venv_arg, "Created virtualenv");
        ToolResult::success(format!("{}\nRecorded venv_path={}", result.content, venv_arg))
    }
}

/// Run a command with a virtualenv's bin directory first on PATH
pub struct RunInVenvTool;

impl RunInVenvTool {
    /// Argument, then remembered venv, then `<root>/.venv`
    fn resolve_venv(input: &Value, ctx: &ToolContext) -> Result<PathBuf, ToolResult> {
        let from_memory = match ctx.memory.get(VENV_MEMORY_KEY) {
            Ok(record) => record.map(|r| r.value),
            Err(e) => {
                warn!(error = %e, "Failed to read venv path from memory");
                None
            }
        };
        let chosen = input["venv_path"]
            .as_str()
            .map(str::to_string)
            .or(from_memory)
            .unwrap_or_else(|| DEFAULT_VENV_DIR.to_string());

        let venv_dir = ctx
            .validate_path(Path::new(&chosen))
            .map_err(ToolResult::from)?;
        if !venv_dir.join("bin").is_dir() {
            return Err(ToolResult::error(format!(
                "No virtualenv at {} (run create_venv first)",
                ctx.display_path(&venv_dir)
            )));
        }
        Ok(venv_dir)
    }
}

#[async_trait]
impl Tool for RunInVenvTool {
    fn name(&self) -> &'static str {
        "run_in_venv"
    }

    fn description(&self) -> &'static str {
        "Run a shell command with the virtualenv's bin directory first on PATH. \
         Uses venv_path from the arguments, then from memory, then .venv."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "venv_path": {
                    "type": "string",
                    "description": "Virtualenv directory (optional)"
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
        debug!(?input, "RunInVenvTool::execute: called");
        let command = match require_str(&input, "command") {
            Ok(c) => c,
            Err(e) => return e,
        };
        let venv_dir = match Self::resolve_venv(&input, ctx) {
            Ok(v) => v,
            Err(e) => return e,
        };

        let runner = ctx.runner.clone().with_venv_bin(venv_dir.join("bin"));
        let timeout = input["timeout"].as_u64();
        ToolResult::from_command(runner.run_text(command, &ctx.cwd, timeout).await)
    }
}
