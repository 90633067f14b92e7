//! Git tools - thin wrappers that route git through the sandboxed runner

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use tracing::debug;

use super::{quote_args, require_str};
use crate::tools::{Tool, ToolContext, ToolResult};

const DEFAULT_LOG_COUNT: u64 = 10;
const MAX_LOG_COUNT: u64 = 200;

async fn run_git(ctx: &ToolContext, args: &[&str]) -> ToolResult {
    let command = match quote_args(std::iter::once("git").chain(args.iter().copied())) {
        Ok(c) => c,
        Err(e) => return e,
    };
    debug!(%command, "run_git: called");
    ToolResult::from_command(ctx.runner.run_text(&command, &ctx.cwd, None).await)
}

/// Reject values git would read as options
fn reject_option(value: &str, what: &str) -> Result<(), ToolResult> {
    if value.starts_with('-') {
        Err(ToolResult::error(format!("{} must not start with '-'", what)))
    } else {
        Ok(())
    }
}

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }

    fn description(&self) -> &'static str {
        "Show the working tree status (git status --short --branch)."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("GitStatusTool::execute: called");
        run_git(ctx, &["status", "--short", "--branch"]).await
    }
}

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }

    fn description(&self) -> &'static str {
        "Show changes in the working tree, or staged changes with staged=true, optionally limited to one path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Limit the diff to this path"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Diff the index instead of the working tree (default: false)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GitDiffTool::execute: called");
        let mut args = vec!["diff"];
        if input["staged"].as_bool().unwrap_or(false) {
            args.push("--staged");
        }
        if let Some(path) = input["path"].as_str() {
            if let Err(e) = ctx.validate_path(Path::new(path)) {
                return e.into();
            }
            args.extend(["--", path]);
        }
        run_git(ctx, &args).await
    }
}

pub struct GitLogTool;

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &'static str {
        "git_log"
    }

    fn description(&self) -> &'static str {
        "Show recent commits, one per line."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {
                    "type": "integer",
                    "description": "Number of commits to show (default: 10)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GitLogTool::execute: called");
        let count = input["count"]
            .as_u64()
            .unwrap_or(DEFAULT_LOG_COUNT)
            .clamp(1, MAX_LOG_COUNT)
            .to_string();
        run_git(ctx, &["log", "--oneline", "-n", &count]).await
    }
}

pub struct GitAddTool;

#[async_trait]
impl Tool for GitAddTool {
    fn name(&self) -> &'static str {
        "git_add"
    }

    fn description(&self) -> &'static str {
        "Stage paths for the next commit."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Paths to stage (use [\".\"] for everything)"
                }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GitAddTool::execute: called");
        let Some(items) = input["paths"].as_array() else {
            return ToolResult::error("paths is required");
        };
        let paths: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
        if paths.is_empty() {
            return ToolResult::error("paths must contain at least one path");
        }
        for path in &paths {
            if let Err(e) = ctx.validate_path(Path::new(path)) {
                return e.into();
            }
        }

        let mut args = vec!["add", "--"];
        args.extend(paths);
        run_git(ctx, &args).await
    }
}

pub struct GitCommitTool;

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &'static str {
        "git_commit"
    }

    fn description(&self) -> &'static str {
        "Commit staged changes with a message."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("GitCommitTool::execute: called");
        let message = match require_str(&input, "message") {
            Ok(m) if !m.trim().is_empty() => m,
            Ok(_) => return ToolResult::error("message must not be empty"),
            Err(e) => return e,
        };
        run_git(ctx, &["commit", "-m", message]).await
    }
}

pub struct GitCheckoutTool;

#[async_trait]
impl Tool for GitCheckoutTool {
    fn name(&self) -> &'static str {
        "git_checkout"
    }

    fn description(&self) -> &'static str {
        "Switch to a branch or commit, or create a new branch with create=true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "Branch name or commit"
                },
                "create": {
                    "type": "boolean",
                    "description": "Create the branch first (default: false)"
                }
            },
            "required": ["target"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "GitCheckoutTool::execute: called");
        let target = match require_str(&input, "target") {
            Ok(t) => t,
            Err(e) => return e,
        };
        if let Err(e) = reject_option(target, "target") {
            return e;
        }

        if input["create"].as_bool().unwrap_or(false) {
            run_git(ctx, &["checkout", "-b", target]).await
        } else {
            run_git(ctx, &["checkout", target]).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_git_log_command_line() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = GitLogTool.execute(json!({"count": 5}), &ctx).await;
        assert!(result.content.starts_with("$ git log --oneline -n 5\n"), "{}", result.content);

        let result = GitLogTool.execute(json!({"count": 100000}), &ctx).await;
        assert!(result.content.starts_with("$ git log --oneline -n 200\n"));
    }

    #[tokio::test]
    async fn test_git_status_outside_repo_is_error() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = GitStatusTool.execute(json!({}), &ctx).await;
        assert!(result.content.starts_with("$ git status --short --branch\n"));
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_git_commit_quotes_message() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = GitCommitTool.execute(json!({"message": "fix parser; add tests"}), &ctx).await;
        assert!(result.content.starts_with("$ git commit -m 'fix parser; add tests'\n"), "{}", result.content);
    }

    #[tokio::test]
    async fn test_git_add_rejects_escape() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = GitAddTool.execute(json!({"paths": ["../secret"]}), &ctx).await;
        assert!(result.is_error);
        assert!(result.content.starts_with("BLOCKED"));

        let result = GitAddTool.execute(json!({"paths": []}), &ctx).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_git_checkout_rejects_option_target() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::for_root(temp.path());

        let result = GitCheckoutTool.execute(json!({"target": "--orphan"}), &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.content, "target must not start with '-'");
    }
}
