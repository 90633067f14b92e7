//! Stepwise - plan / execute / review agent loop
//!
//! Stepwise advances a coding goal through repeated planning, sandboxed tool
//! execution, and review. A controller owns the session state and routes on
//! the reviewer's verdict; an executor drives one plan step through a
//! tool-calling conversation; every shell side effect goes through a
//! confined command runner; old tool output is pruned to bounded stand-ins
//! while the raw text stays retrievable by call id.
//!
//! # Modules
//!
//! - [`controller`] - verdict-driven state machine
//! - [`executor`] - tool-calling turn loop for one step
//! - [`sandbox`] - command policy, environment, and runner
//! - [`pruning`] - tool output store and context pruner
//! - [`parse`] - structured decisions from free-form replies
//! - [`session`] - session state and role result types
//! - [`tools`] - tool trait, context, and registry
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`prompts`] - role prompt templates
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod controller;
pub mod executor;
pub mod llm;
pub mod parse;
pub mod prompts;
pub mod pruning;
pub mod sandbox;
pub mod session;
pub mod tools;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use controller::{Controller, Destination, SessionOutcome, SessionReport, Visit};
pub use executor::StepExecutor;
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use pruning::{PruningConfig, ToolOutputStore, prune, summarize_tool_output};
pub use sandbox::{CommandNotAllowed, CommandRunner};
pub use session::{ReviewDecision, SessionState, StepResult, Verdict};
pub use tools::{Tool, ToolContext, ToolRegistry, ToolResult};
