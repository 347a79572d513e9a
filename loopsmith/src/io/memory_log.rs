//! Session memory: the ordered log of every message exchanged with the model.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::message::Message;
use crate::io::json_file::{read_or_default, write_atomic};

/// Append-only message log persisted as a JSON array.
///
/// Every append is a full read-modify-write of the file. One process owns
/// the file at a time; concurrent writers would race.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    path: PathBuf,
}

impl MemoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted messages in append order.
    ///
    /// A missing, empty, or malformed file yields an empty log.
    pub fn load(&self) -> Vec<Message> {
        read_or_default(&self.path)
    }

    /// Append exactly one message.
    #[instrument(skip_all, fields(role = ?message.role))]
    pub fn append(&self, message: &Message) -> Result<()> {
        let mut messages = self.load();
        messages.push(message.clone());
        debug!(len = messages.len(), "appending to memory log");
        write_atomic(&self.path, &messages)
    }

    /// Truncate the log to empty.
    pub fn reset(&self) -> Result<()> {
        debug!(path = %self.path.display(), "resetting memory log");
        write_atomic(&self.path, &Vec::<Message>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::FunctionCall;
    use serde_json::json;
    use std::fs;

    fn log_in(temp: &tempfile::TempDir) -> MemoryLog {
        MemoryLog::new(temp.path().join("memory.json"))
    }

    /// Verifies N single appends load back as exactly those N messages, in order.
    #[test]
    fn append_then_load_preserves_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = log_in(&temp);
        let messages = vec![
            Message::system("rules"),
            Message::user("hello"),
            Message::assistant_call(FunctionCall::new("read_file", json!({"path": "a"}))),
            Message::tool_result(&FunctionCall::new("read_file", json!({})), "contents"),
            Message::assistant("done"),
        ];
        for message in &messages {
            log.append(message).expect("append");
        }
        assert_eq!(log.load(), messages);
    }

    #[test]
    fn reset_always_yields_empty_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = log_in(&temp);

        log.reset().expect("reset missing");
        assert!(log.load().is_empty());

        log.append(&Message::user("x")).expect("append");
        log.reset().expect("reset populated");
        assert!(log.load().is_empty());

        fs::write(log.path(), "garbage").expect("write garbage");
        log.reset().expect("reset corrupt");
        assert!(log.load().is_empty());
    }

    #[test]
    fn corrupt_log_is_treated_as_empty_and_recovers_on_append() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = log_in(&temp);
        fs::write(log.path(), "[{\"role\": 7}").expect("write corrupt");

        assert!(log.load().is_empty());
        log.append(&Message::user("fresh")).expect("append");
        assert_eq!(log.load(), vec![Message::user("fresh")]);
    }
}
