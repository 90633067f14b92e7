//! Built-in tools

mod cmd;
mod edit_file;
mod fs_ops;
mod git;
mod grep;
mod list_files;
mod memory;
mod read_file;
mod venv;
mod write_file;

pub use cmd::{ApplyPatchTool, RunCmdTool, RunPytestTool};
pub use edit_file::EditFileTool;
pub use fs_ops::{CreateDirTool, ListDirTool, MovePathTool, RemovePathTool};
pub use git::{GitAddTool, GitCheckoutTool, GitCommitTool, GitDiffTool, GitLogTool, GitStatusTool};
pub use grep::GrepTool;
pub use list_files::ListFilesTool;
pub use memory::{
    MemoryAppendTool, MemoryClearTool, MemoryDeleteTool, MemoryGetTool, MemoryListTool, MemorySetTool,
};
pub use read_file::ReadFileTool;
pub use venv::{CreateVenvTool, RunInVenvTool};
pub use write_file::WriteFileTool;

use serde_json::Value;

use super::{ToolError, ToolResult};

/// Fetch a required string argument or produce the tool's error result
pub(crate) fn require_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolResult> {
    input[key]
        .as_str()
        .ok_or_else(|| ToolError::MissingArgument(key.to_string()).into())
}

/// Quote arguments for `sh -c`
pub(crate) fn quote_args<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<String, ToolResult> {
    shlex::try_join(args).map_err(|e| ToolError::InvalidArgument(e.to_string()).into())
}
