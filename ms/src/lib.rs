//! MemStore - durable key/value scratch memory scoped to a working root
//!
//! Agent sessions use this to remember facts between steps (the working
//! directory, a venv path, the last test run). Values live in an in-process
//! cache overlaid on a JSON file at the root of the working tree.
//!
//! # Layout
//!
//! ```text
//! <working-root>/
//! └── .agent_memory.json   # {"key": {"value": "...", "updated_at": "..."}}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use memstore::MemoryStore;
//!
//! let store = MemoryStore::open("/path/to/repo");
//! store.set("working_directory", "/path/to/repo")?;
//! let dir = store.get("working_directory")?;
//! ```

pub mod cli;
mod store;

pub use store::{MemoryRecord, MemoryStore, format_listing};

/// File name of the persisted memory inside a working root
pub const MEMORY_FILE_NAME: &str = ".agent_memory.json";

/// Separator used by `append` when the caller does not supply one
pub const DEFAULT_SEPARATOR: &str = "\n";
