//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::context::ToolContext;
use crate::llm::ToolDefinition;

/// An executor capability
///
/// `execute` never fails: problems are reported in the returned
/// [`ToolResult`] so the model can react to them.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;

    /// What the model is told about this tool
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Text handed back to the model, flagged when the call went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Wrap sandbox result text; anything but a clean `(exit=0)` is an error
    pub fn from_command(text: String) -> Self {
        let ok = text.lines().nth(1) == Some("(exit=0)");
        Self {
            content: text,
            is_error: !ok,
        }
    }
}
