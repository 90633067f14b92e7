//! Tool error types
//!
//! Tools never fail the executor; every error is folded into an error
//! [`ToolResult`](super::ToolResult) the model can read.

use std::path::PathBuf;
use thiserror::Error;

use super::ToolResult;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("BLOCKED: path {path} escapes working root {root}")]
    SandboxViolation { path: PathBuf, root: PathBuf },

    #[error("Must read file before editing: {path}")]
    EditWithoutRead { path: String },

    #[error("{0} is required")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Memory store error: {0}")]
    Memory(String),
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::error(err.to_string())
    }
}
