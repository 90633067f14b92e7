//! Embedded fallback prompts
//!
//! Compiled into the binary and used when no override file exists.

/// System prompt for the planner role
pub const PLANNER: &str = include_str!("../../prompts/planner.pmt");

/// System prompt for the executor role
pub const EXECUTOR: &str = include_str!("../../prompts/executor.pmt");

/// System prompt for the reviewer role
pub const REVIEWER: &str = include_str!("../../prompts/reviewer.pmt");

/// Get an embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "planner" => Some(PLANNER),
        "executor" => Some(EXECUTOR),
        "reviewer" => Some(REVIEWER),
        _ => None,
    }
}
