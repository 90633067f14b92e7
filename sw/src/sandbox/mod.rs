//! Sandboxed command execution
//!
//! Every shell side effect an agent asks for passes through [`CommandRunner`]:
//! the command string is checked against a blocklist, each command segment's
//! base word against an allowlist, and every path-looking argument against
//! the working root. Accepted commands run under `sh -c` with a rebuilt
//! environment (network off unless enabled, filtered `PATH`) and a hard,
//! capped timeout.

mod env;
mod error;
mod policy;
mod runner;

pub use env::{filter_path, sandbox_env};
pub use error::CommandNotAllowed;
pub use policy::{ALLOWED_COMMANDS, base_command, check_command, normalize_path, split_segments};
pub use runner::CommandRunner;

/// Timeout used when the caller does not ask for one
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on any command timeout
pub const MAX_TIMEOUT_SECS: u64 = 300;
