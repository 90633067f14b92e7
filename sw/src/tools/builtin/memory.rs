//! Memory tools - expose the working root's key/value memory to the agent

use async_trait::async_trait;
use memstore::{DEFAULT_SEPARATOR, format_listing};
use serde_json::{Value, json};
use tracing::debug;

use super::require_str;
use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

fn memory_error(e: eyre::Report) -> ToolResult {
    ToolError::Memory(format!("{:#}", e)).into()
}

fn key_schema(extra: Value) -> Value {
    let mut properties = json!({
        "key": {"type": "string", "description": "Memory key"}
    });
    let mut required = vec![json!("key")];
    if let (Some(props), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        for (name, schema) in extra {
            if name == "value" {
                required.push(json!("value"));
            }
            props.insert(name, schema);
        }
    }
    json!({"type": "object", "properties": properties, "required": required})
}

pub struct MemorySetTool;

#[async_trait]
impl Tool for MemorySetTool {
    fn name(&self) -> &'static str {
        "memory_set"
    }

    fn description(&self) -> &'static str {
        "Remember a value under a key (replaces any previous value). Persists across steps and sessions."
    }

    fn input_schema(&self) -> Value {
        key_schema(json!({"value": {"type": "string", "description": "Value to store"}}))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("MemorySetTool::execute: called");
        let (key, value) = match (require_str(&input, "key"), require_str(&input, "value")) {
            (Ok(k), Ok(v)) => (k, v),
            (Err(e), _) | (_, Err(e)) => return e,
        };
        match ctx.memory.set(key, value) {
            Ok(_) => ToolResult::success(format!("Stored {} ({} chars)", key, value.chars().count())),
            Err(e) => memory_error(e),
        }
    }
}

pub struct MemoryGetTool;

#[async_trait]
impl Tool for MemoryGetTool {
    fn name(&self) -> &'static str {
        "memory_get"
    }

    fn description(&self) -> &'static str {
        "Recall the value stored under a key."
    }

    fn input_schema(&self) -> Value {
        key_schema(json!({}))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("MemoryGetTool::execute: called");
        let key = match require_str(&input, "key") {
            Ok(k) => k,
            Err(e) => return e,
        };
        match ctx.memory.get(key) {
            Ok(Some(record)) => ToolResult::success(record.value),
            Ok(None) => ToolResult::error(format!("No memory stored for key: {}", key)),
            Err(e) => memory_error(e),
        }
    }
}

pub struct MemoryListTool;

#[async_trait]
impl Tool for MemoryListTool {
    fn name(&self) -> &'static str {
        "memory_list"
    }

    fn description(&self) -> &'static str {
        "List remembered keys with their sizes and update times."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("MemoryListTool::execute: called");
        match ctx.memory.list() {
            Ok(entries) => ToolResult::success(format_listing(&entries)),
            Err(e) => memory_error(e),
        }
    }
}

pub struct MemoryDeleteTool;

#[async_trait]
impl Tool for MemoryDeleteTool {
    fn name(&self) -> &'static str {
        "memory_delete"
    }

    fn description(&self) -> &'static str {
        "Forget one key."
    }

    fn input_schema(&self) -> Value {
        key_schema(json!({}))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("MemoryDeleteTool::execute: called");
        let key = match require_str(&input, "key") {
            Ok(k) => k,
            Err(e) => return e,
        };
        match ctx.memory.delete(key) {
            Ok(true) => ToolResult::success(format!("Deleted {}", key)),
            Ok(false) => ToolResult::success(format!("No memory stored for key: {}", key)),
            Err(e) => memory_error(e),
        }
    }
}

pub struct MemoryAppendTool;

#[async_trait]
impl Tool for MemoryAppendTool {
    fn name(&self) -> &'static str {
        "memory_append"
    }

    fn description(&self) -> &'static str {
        "Append text to a remembered value (creating it if missing), joined by a separator (default newline)."
    }

    fn input_schema(&self) -> Value {
        key_schema(json!({
            "value": {"type": "string", "description": "Text to append"},
            "separator": {"type": "string", "description": "Joiner between old and new text (default: newline)"}
        }))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("MemoryAppendTool::execute: called");
        let (key, value) = match (require_str(&input, "key"), require_str(&input, "value")) {
            (Ok(k), Ok(v)) => (k, v),
            (Err(e), _) | (_, Err(e)) => return e,
        };
        let separator = input["separator"].as_str().unwrap_or(DEFAULT_SEPARATOR);
        match ctx.memory.append(key, value, separator) {
            Ok(record) => ToolResult::success(format!("Appended to {} ({} chars)", key, record.value.chars().count())),
            Err(e) => memory_error(e),
        }
    }
}

pub struct MemoryClearTool;

#[async_trait]
impl Tool for MemoryClearTool {
    fn name(&self) -> &'static str {
        "memory_clear"
    }

    fn description(&self) -> &'static str {
        "Forget every remembered key for this working root."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("MemoryClearTool::execute: called");
        match ctx.memory.clear() {
            Ok(count) => ToolResult::success(format!("Cleared {} entries", count)),
            Err(e) => memory_error(e),
        }
    }
}
