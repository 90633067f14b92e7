//! Role prompts
//!
//! Each role (planner, executor, reviewer) has a system prompt template.
//! Templates are resolved in this order:
//!
//! 1. `<working-root>/.stepwise/prompts/<name>.pmt`
//! 2. Embedded defaults compiled into the binary

mod embedded;
mod loader;

pub use embedded::get_embedded;
pub use loader::{PromptContext, PromptLoader, Role};
