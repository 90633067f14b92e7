//! Tool system for the executor
//!
//! Tools give the executor file access, command execution, git, virtualenv
//! and memory operations. Every call runs with a `ToolContext` confined to
//! the session's working root - tools cannot escape it, and every shell
//! command goes through the sandboxed `CommandRunner`.

mod context;
mod error;
mod registry;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use error::ToolError;
pub use registry::{ToolRegistry, WORKING_ROOT_ARG};
pub use traits::{Tool, ToolResult};
