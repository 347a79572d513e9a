//! Whole-file JSON persistence shared by the state stores.
//!
//! Every store reads the full document, mutates it in memory, and writes it
//! back. Writes go through a temp file + rename so a crash never leaves a
//! half-written document behind.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Read a JSON document, falling back to `T::default()` when the file is
/// missing, empty, or malformed.
///
/// Malformed content is logged and treated as empty state; it is never fatal.
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "unreadable state file, using empty state");
            return T::default();
        }
    };
    if contents.trim().is_empty() {
        return T::default();
    }
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "corrupt state file, using empty state");
            T::default()
        }
    }
}

/// Atomically write `value` as pretty JSON with a trailing newline.
pub fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
