//! Raw tool output keyed by call id

use std::collections::HashMap;
use tracing::debug;

/// Session-lifetime map from tool call id to the unpruned result text
///
/// The first write for an id wins; later puts are ignored.
#[derive(Debug, Default, Clone)]
pub struct ToolOutputStore {
    outputs: HashMap<String, String>,
}

impl ToolOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `raw` under `call_id` unless already present; returns whether it was stored
    pub fn put(&mut self, call_id: &str, raw: impl Into<String>) -> bool {
        if self.outputs.contains_key(call_id) {
            debug!(%call_id, "ToolOutputStore::put: already stored, ignoring");
            return false;
        }
        let raw = raw.into();
        debug!(%call_id, len = raw.len(), "ToolOutputStore::put: stored");
        self.outputs.insert(call_id.to_string(), raw);
        true
    }

    pub fn get(&self, call_id: &str) -> Option<&str> {
        self.outputs.get(call_id).map(String::as_str)
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.outputs.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
