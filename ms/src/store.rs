//! Core MemoryStore implementation

use chrono::{DateTime, NaiveDateTime, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// A single remembered value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Stored text
    pub value: String,
    /// Last time the value was written
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a record stamped with the current time
    pub fn now(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            updated_at: Utc::now(),
        }
    }

    /// Decode one entry of the memory file, accepting older layouts
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self {
                value: s.clone(),
                updated_at: DateTime::default(),
            }),
            Value::Object(map) => {
                let value = match map.get("value")? {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let updated_at = map
                    .get("updated_at")
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp)
                    .unwrap_or_default();
                Some(Self { value, updated_at })
            }
            _ => None,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Key/value memory for one working root
///
/// Reads see the file merged with this process's cache; the cache wins when
/// both hold the same key. Every mutation re-reads the file, merges, and
/// rewrites it.
pub struct MemoryStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, MemoryRecord>>,
}

impl MemoryStore {
    /// Open the memory of a working root (the file is created on first write)
    pub fn open(root: impl AsRef<Path>) -> Self {
        let path = root.as_ref().join(crate::MEMORY_FILE_NAME);
        debug!(?path, "MemoryStore::open: called");
        Self {
            path,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a value, replacing any previous one
    pub fn set(&self, key: &str, value: &str) -> Result<MemoryRecord> {
        debug!(%key, value_len = value.len(), "MemoryStore::set: called");
        let record = MemoryRecord::now(value);
        let mut cache = self.cache();
        cache.insert(key.to_string(), record.clone());
        self.persist(&cache, None)?;
        Ok(record)
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Result<Option<MemoryRecord>> {
        debug!(%key, "MemoryStore::get: called");
        if let Some(record) = self.cache().get(key) {
            debug!("MemoryStore::get: cache hit");
            return Ok(Some(record.clone()));
        }
        let mut disk = self.load_disk()?;
        Ok(disk.remove(key))
    }

    /// All entries, sorted by key
    pub fn list(&self) -> Result<Vec<(String, MemoryRecord)>> {
        debug!("MemoryStore::list: called");
        let cache = self.cache();
        let mut merged = self.load_disk()?;
        merged.extend(cache.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(merged.into_iter().collect())
    }

    /// Remove a key from both the cache and the file; returns whether it existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        debug!(%key, "MemoryStore::delete: called");
        let mut cache = self.cache();
        let in_cache = cache.remove(key).is_some();
        let on_disk = self.load_disk()?.contains_key(key);
        if in_cache || on_disk {
            self.persist(&cache, Some(key))?;
            info!(%key, "Deleted memory entry");
        }
        Ok(in_cache || on_disk)
    }

    /// Append to an existing value (or create it) joined by `separator`
    pub fn append(&self, key: &str, value: &str, separator: &str) -> Result<MemoryRecord> {
        debug!(%key, value_len = value.len(), "MemoryStore::append: called");
        let combined = match self.get(key)? {
            Some(existing) if !existing.value.is_empty() => format!("{}{}{}", existing.value, separator, value),
            _ => value.to_string(),
        };
        self.set(key, &combined)
    }

    /// Forget everything; returns how many entries were dropped
    pub fn clear(&self) -> Result<usize> {
        debug!("MemoryStore::clear: called");
        let count = self.list()?.len();
        self.cache().clear();
        if self.path.exists() {
            fs::remove_file(&self.path).context(format!("Failed to remove {}", self.path.display()))?;
        }
        info!(count, "Cleared memory");
        Ok(count)
    }

    fn cache(&self) -> MutexGuard<'_, BTreeMap<String, MemoryRecord>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_disk(&self) -> Result<BTreeMap<String, MemoryRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content =
            fs::read_to_string(&self.path).context(format!("Failed to read {}", self.path.display()))?;
        let entries = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Memory file is not a JSON object, ignoring it");
                return Ok(BTreeMap::new());
            }
        };
        Ok(entries
            .iter()
            .filter_map(|(k, v)| MemoryRecord::from_json(v).map(|r| (k.clone(), r)))
            .collect())
    }

    fn persist(&self, cache: &BTreeMap<String, MemoryRecord>, removed: Option<&str>) -> Result<()> {
        let mut merged = self.load_disk()?;
        if let Some(key) = removed {
            merged.remove(key);
        }
        merged.extend(cache.iter().map(|(k, v)| (k.clone(), v.clone())));

        let content = serde_json::to_string_pretty(&merged)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).context(format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).context(format!("Failed to replace {}", self.path.display()))?;
        debug!(entries = merged.len(), "MemoryStore::persist: written");
        Ok(())
    }
}

/// Render entries as a `Key | Size | Updated` table
pub fn format_listing(entries: &[(String, MemoryRecord)]) -> String {
    if entries.is_empty() {
        return "(memory is empty)".to_string();
    }
    let mut lines = vec!["Key | Size | Updated".to_string(), "-".repeat(50)];
    for (key, record) in entries {
        lines.push(format!(
            "{} | {} chars | {}",
            key,
            record.value.chars().count(),
            record.updated_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::open(temp.path());
        store.set("working_directory", "/repo").unwrap();

        let reopened = MemoryStore::open(temp.path());
        let record = reopened.get("working_directory").unwrap().unwrap();
        assert_eq!(record.value, "/repo");
        assert!(temp.path().join(crate::MEMORY_FILE_NAME).exists());
    }

    #[test]
    fn test_cache_wins_over_file() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::open(temp.path());
        store.set("k", "mine").unwrap();

        // another writer changes the same key and adds one
        let other = MemoryStore::open(temp.path());
        other.set("k", "theirs").unwrap();
        other.set("extra", "x").unwrap();

        assert_eq!(store.get("k").unwrap().unwrap().value, "mine");
        let keys: Vec<String> = store.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["extra".to_string(), "k".to_string()]);

        // the next mutation writes the cached value back
        store.set("other", "y").unwrap();
        let fresh = MemoryStore::open(temp.path());
        assert_eq!(fresh.get("k").unwrap().unwrap().value, "mine");
    }

    #[test]
    fn test_delete_removes_from_cache_and_file() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::open(temp.path());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        store.set("c", "3").unwrap();

        let fresh = MemoryStore::open(temp.path());
        assert!(fresh.get("a").unwrap().is_none());
        assert_eq!(fresh.list().unwrap().len(), 2);
    }

    #[test]
    fn test_append_creates_and_joins() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::open(temp.path());

        store.append("log", "first", crate::DEFAULT_SEPARATOR).unwrap();
        store.append("log", "second", crate::DEFAULT_SEPARATOR).unwrap();
        store.append("csv", "a", ",").unwrap();
        store.append("csv", "b", ",").unwrap();

        assert_eq!(store.get("log").unwrap().unwrap().value, "first\nsecond");
        assert_eq!(store.get("csv").unwrap().unwrap().value, "a,b");
    }

    #[test]
    fn test_clear_removes_file() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::open(temp.path());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(!store.path().exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(crate::MEMORY_FILE_NAME), "not json {").unwrap();

        let store = MemoryStore::open(temp.path());
        assert!(store.list().unwrap().is_empty());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap().value, "v");
    }

    #[test]
    fn test_legacy_entries_are_accepted() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(crate::MEMORY_FILE_NAME),
            r#"{"naive": {"value": "x", "updated_at": "2024-05-01T10:20:30.123456"}, "bare": "y", "bad": 3}"#,
        )
        .unwrap();

        let store = MemoryStore::open(temp.path());
        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        let naive = store.get("naive").unwrap().unwrap();
        assert_eq!(naive.updated_at.format("%Y-%m-%d").to_string(), "2024-05-01");
        assert_eq!(store.get("bare").unwrap().unwrap().value, "y");
    }

    #[test]
    fn test_format_listing() {
        assert_eq!(format_listing(&[]), "(memory is empty)");

        let listing = format_listing(&[("key".to_string(), MemoryRecord::now("hello"))]);
        assert!(listing.starts_with("Key | Size | Updated"));
        assert!(listing.contains("key | 5 chars |"));
    }
}
