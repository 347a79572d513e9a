//! Human-readable activity log in `.loopsmith/activity.log`.
//!
//! Product output, written regardless of `RUST_LOG`. One line per event:
//! `YYYY-MM-DD HH:MM:SS → <message>`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the model asked for `tool` with `args`.
    pub fn planning(&self, tool: &str, args: &str) -> Result<()> {
        self.record(&format!("PLANNING: {tool} {args}"))
    }

    /// Record the result of running `tool`.
    pub fn did(&self, tool: &str, result: &str) -> Result<()> {
        self.record(&format!("DID: {tool} {}", result.trim()))
    }

    pub fn record(&self, message: &str) -> Result<()> {
        self.record_at(Local::now(), message)
    }

    fn record_at(&self, at: DateTime<Local>, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        writeln!(file, "{}", format_line(at, message))
            .with_context(|| format!("append {}", self.path.display()))
    }
}

fn format_line(at: DateTime<Local>, message: &str) -> String {
    // Keep one event per line.
    let flat = message.replace('\n', " ");
    format!("{} → {}", at.format(TIMESTAMP_FORMAT), flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_format_is_timestamp_arrow_message() {
        let at = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("valid time");
        assert_eq!(
            format_line(at, "DID: write_file ok\nmore"),
            "2024-03-09 14:05:07 → DID: write_file ok more"
        );
    }

    #[test]
    fn planning_and_did_append_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = ActivityLog::new(temp.path().join("logs/activity.log"));
        log.planning("write_file", r#"{"path":"a"}"#).expect("planning");
        log.did("write_file", "Appended content to a\n").expect("did");

        let text = fs::read_to_string(log.path()).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(r#"→ PLANNING: write_file {"path":"a"}"#));
        assert!(lines[1].ends_with("→ DID: write_file Appended content to a"));
    }
}
