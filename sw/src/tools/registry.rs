//! ToolRegistry - the fixed set of tools an executor may call

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{
    ApplyPatchTool, CreateDirTool, CreateVenvTool, EditFileTool, GitAddTool, GitCheckoutTool, GitCommitTool,
    GitDiffTool, GitLogTool, GitStatusTool, GrepTool, ListDirTool, ListFilesTool, MemoryAppendTool, MemoryClearTool,
    MemoryDeleteTool, MemoryGetTool, MemoryListTool, MemorySetTool, MovePathTool, ReadFileTool, RemovePathTool,
    RunCmdTool, RunInVenvTool, RunPytestTool, WriteFileTool,
};
use super::{Tool, ToolContext, ToolResult};

/// Argument every tool accepts; filled in from the context when omitted
pub const WORKING_ROOT_ARG: &str = "working_root";

/// Tools available to the executor, keyed by name
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a registry with every built-in tool
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        // commands
        registry.add_tool(Box::new(RunCmdTool));
        registry.add_tool(Box::new(ApplyPatchTool));
        registry.add_tool(Box::new(RunPytestTool));

        // files
        registry.add_tool(Box::new(ReadFileTool));
        registry.add_tool(Box::new(WriteFileTool));
        registry.add_tool(Box::new(EditFileTool));
        registry.add_tool(Box::new(ListFilesTool));
        registry.add_tool(Box::new(GrepTool));
        registry.add_tool(Box::new(ListDirTool));
        registry.add_tool(Box::new(CreateDirTool));
        registry.add_tool(Box::new(RemovePathTool));
        registry.add_tool(Box::new(MovePathTool));

        // git
        registry.add_tool(Box::new(GitStatusTool));
        registry.add_tool(Box::new(GitDiffTool));
        registry.add_tool(Box::new(GitLogTool));
        registry.add_tool(Box::new(GitAddTool));
        registry.add_tool(Box::new(GitCommitTool));
        registry.add_tool(Box::new(GitCheckoutTool));

        // venv
        registry.add_tool(Box::new(CreateVenvTool));
        registry.add_tool(Box::new(RunInVenvTool));

        // memory
        registry.add_tool(Box::new(MemorySetTool));
        registry.add_tool(Box::new(MemoryGetTool));
        registry.add_tool(Box::new(MemoryListTool));
        registry.add_tool(Box::new(MemoryDeleteTool));
        registry.add_tool(Box::new(MemoryAppendTool));
        registry.add_tool(Box::new(MemoryClearTool));

        registry
    }

    /// Create an empty registry (for testing)
    pub fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Add a tool, replacing any tool of the same name
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the LLM, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| t.definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute one tool call
    ///
    /// Unknown names and bad `working_root` arguments come back as error
    /// results rather than failures.
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(name = %tool_call.name, id = %tool_call.id, "ToolRegistry::execute: called");
        let Some(tool) = self.tools.get(&tool_call.name) else {
            warn!(name = %tool_call.name, "Unknown tool requested");
            return ToolResult::error(format!(
                "Unknown tool: {}. Available: [{}]",
                tool_call.name,
                self.tool_names().join(", ")
            ));
        };

        let mut input = match &tool_call.input {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return ToolResult::error(format!("Tool arguments must be a JSON object, got: {}", other));
            }
        };

        let scoped = match input.get(WORKING_ROOT_ARG).and_then(Value::as_str) {
            Some(requested) => match Self::scope_for(requested, ctx) {
                Ok(scoped) => scoped,
                Err(e) => return e,
            },
            None => {
                input.insert(
                    WORKING_ROOT_ARG.to_string(),
                    Value::String(ctx.cwd.to_string_lossy().into_owned()),
                );
                ctx.clone()
            }
        };

        tool.execute(Value::Object(input), &scoped).await
    }

    /// A model-supplied working_root must be an existing directory inside the session root
    fn scope_for(requested: &str, ctx: &ToolContext) -> Result<ToolContext, ToolResult> {
        let dir = ctx
            .validate_path(Path::new(requested))
            .map_err(ToolResult::from)?;
        if !dir.is_dir() {
            return Err(ToolResult::error(format!(
                "BLOCKED: working_root {} is not a directory inside {}",
                requested,
                ctx.working_root.display()
            )));
        }
        Ok(ctx.scoped(dir))
    }

    /// Execute calls strictly in order; results pair with their call ids
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let result = self.execute(call, ctx).await;
            results.push((call.id.clone(), result));
        }
        results
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
