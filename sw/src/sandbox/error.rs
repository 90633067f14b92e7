//! Sandbox error types

use thiserror::Error;

/// A command rejected by the sandbox policy before it ran
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CommandNotAllowed {
    pub command: String,
    pub reason: String,
}

impl CommandNotAllowed {
    pub fn new(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Result text handed back to the agent in place of command output
    pub fn to_result_text(&self) -> String {
        format!("$ {}\n(BLOCKED: {})", self.command, self.reason)
    }
}
