//! Self-report and user feedback.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::task::Task;
use crate::io::flow_store::{Flows, load_flows};
use crate::io::init::AgentPaths;
use crate::io::kv_store::KvStore;
use crate::io::memory_log::MemoryLog;
use crate::io::task_store::load_tasks;

/// Snapshot of the agent's persisted state.
#[derive(Debug, Clone)]
pub struct SelfReport {
    pub tasks: Vec<Task>,
    pub memory_messages: usize,
    pub stored_keys: Vec<String>,
    pub flows: Flows,
}

impl SelfReport {
    pub fn collect(paths: &AgentPaths) -> Self {
        Self {
            tasks: load_tasks(&paths.tasks_path),
            memory_messages: MemoryLog::new(&paths.memory_path).load().len(),
            stored_keys: KvStore::new(&paths.kv_path).keys(),
            flows: load_flows(&paths.flows_path),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Self-Awareness Report:\n");

        out.push_str("1. Current Objectives and Tasks:\n");
        if self.tasks.is_empty() {
            out.push_str("- (none)\n");
        }
        for task in &self.tasks {
            let _ = writeln!(
                out,
                "- {} [step {}/{}]: {}",
                task.id,
                task.current_step.saturating_add(1).min(task.steps.len()),
                task.steps.len(),
                task.current().unwrap_or("(finished)")
            );
        }

        let _ = writeln!(out, "2. Session Memory: {} messages", self.memory_messages);

        out.push_str("3. Stored Keys:");
        if self.stored_keys.is_empty() {
            out.push_str(" (none)");
        } else {
            let _ = write!(out, " {}", self.stored_keys.join(", "));
        }
        out.push('\n');

        out.push_str("4. Flows:\n");
        if self.flows.is_empty() {
            out.push_str("- (none)\n");
        }
        for (name, commands) in &self.flows {
            let joined: Vec<String> = commands.iter().map(|argv| argv.join(" ")).collect();
            let _ = writeln!(out, "- {name}: {}", joined.join(" ; "));
        }
        out
    }
}

/// Append one line of user feedback to `feedback.txt`.
pub fn record_feedback(paths: &AgentPaths, text: &str) -> Result<()> {
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create directory {}", paths.state_dir.display()))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.feedback_path)
        .with_context(|| format!("open {}", paths.feedback_path.display()))?;
    writeln!(file, "{}", text.trim_end())
        .with_context(|| format!("append {}", paths.feedback_path.display()))?;
    info!(bytes = text.len(), "feedback recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::io::flow_store::define_flow;
    use crate::io::task_store::write_tasks;
    use serde_json::json;

    #[test]
    fn report_lists_every_section() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let mut task = Task::new("docs", vec!["outline".to_string(), "write".to_string()]);
        task.current_step = 1;
        write_tasks(&paths.tasks_path, &[task]).expect("tasks");
        MemoryLog::new(&paths.memory_path)
            .append(&Message::user("hi"))
            .expect("memory");
        KvStore::new(&paths.kv_path).save("owner", json!("me")).expect("kv");
        define_flow(&paths.flows_path, "sync", vec![vec!["git".into(), "pull".into()]]).expect("flow");

        let text = SelfReport::collect(&paths).render();
        assert!(text.starts_with("Self-Awareness Report:\n"));
        assert!(text.contains("- docs [step 2/2]: write"));
        assert!(text.contains("2. Session Memory: 1 messages"));
        assert!(text.contains("3. Stored Keys: owner"));
        assert!(text.contains("- sync: git pull"));
    }

    /// Verifies a hand-edited step index past the end renders as finished.
    #[test]
    fn out_of_range_step_renders_as_finished() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let mut task = Task::new("t1", vec!["only".to_string()]);
        task.current_step = usize::MAX;
        write_tasks(&paths.tasks_path, &[task]).expect("tasks");

        let text = SelfReport::collect(&paths).render();
        assert!(text.contains("- t1 [step 1/1]: (finished)"));
    }

    #[test]
    fn empty_state_reports_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let text = SelfReport::collect(&AgentPaths::new(temp.path())).render();
        assert!(text.contains("1. Current Objectives and Tasks:\n- (none)"));
        assert!(text.contains("3. Stored Keys: (none)"));
    }

    #[test]
    fn feedback_is_appended() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        record_feedback(&paths, "more tests").expect("first");
        record_feedback(&paths, "fewer prompts\n").expect("second");
        assert_eq!(
            fs::read_to_string(&paths.feedback_path).expect("read"),
            "more tests\nfewer prompts\n"
        );
    }
}
