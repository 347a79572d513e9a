//! Key/value store backing the `save_memory` and `load_memory` capabilities.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::io::json_file::{read_or_default, write_atomic};

/// JSON object file mapping keys to arbitrary JSON values.
#[derive(Debug, Clone)]
pub struct KvStore {
    path: PathBuf,
}

impl KvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> BTreeMap<String, Value> {
        read_or_default(&self.path)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn save(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.load_all();
        entries.insert(key.to_string(), value);
        debug!(key, entries = entries.len(), "saving memory entry");
        write_atomic(&self.path, &entries)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.load_all().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.load_all().into_keys().collect()
    }
}
