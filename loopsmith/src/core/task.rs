//! Task list model and cursor rules.

use serde::{Deserialize, Serialize};

/// A unit of autonomous work: ordered steps plus a cursor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub current_step: usize,
}

impl Task {
    pub fn new(id: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            id: id.into(),
            steps,
            current_step: 0,
        }
    }

    /// Text of the step under the cursor, if any remain.
    pub fn current(&self) -> Option<&str> {
        self.steps.get(self.current_step).map(String::as_str)
    }

    /// True once the cursor has reached (or passed) the end of the steps.
    pub fn is_finished(&self) -> bool {
        self.current_step >= self.steps.len()
    }
}

/// Result of advancing the head task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved; the task stays at the head of the list.
    Moved { id: String, current_step: usize },
    /// Cursor reached the end; the task was removed.
    Completed { id: String },
    /// The list was empty.
    NoTask,
}

/// Move the head task's cursor forward by one step, dropping it when done.
pub fn advance_head(tasks: &mut Vec<Task>) -> Advance {
    let Some(head) = tasks.first_mut() else {
        return Advance::NoTask;
    };
    if head.current_step < head.steps.len() {
        head.current_step += 1;
    }
    if head.is_finished() {
        let done = tasks.remove(0);
        return Advance::Completed { id: done.id };
    }
    Advance::Moved {
        id: head.id.clone(),
        current_step: head.current_step,
    }
}

/// Remove finished tasks from the front of the list.
///
/// Returns the ids that were dropped, in list order.
pub fn drop_finished_head(tasks: &mut Vec<Task>) -> Vec<String> {
    let mut dropped = Vec::new();
    while tasks.first().is_some_and(Task::is_finished) {
        dropped.push(tasks.remove(0).id);
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, steps: &[&str], current_step: usize) -> Task {
        Task {
            id: id.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            current_step,
        }
    }

    #[test]
    fn advance_moves_cursor_then_removes_task() {
        let mut tasks = vec![task("t1", &["a", "b"], 0)];

        assert_eq!(
            advance_head(&mut tasks),
            Advance::Moved {
                id: "t1".to_string(),
                current_step: 1
            }
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].current(), Some("b"));

        assert_eq!(
            advance_head(&mut tasks),
            Advance::Completed {
                id: "t1".to_string()
            }
        );
        assert!(tasks.is_empty());
    }

    #[test]
    fn advance_on_empty_list_is_noop() {
        let mut tasks = Vec::new();
        assert_eq!(advance_head(&mut tasks), Advance::NoTask);
    }

    #[test]
    fn drop_finished_head_stops_at_first_open_task() {
        let mut tasks = vec![
            task("done", &["a"], 1),
            task("empty", &[], 0),
            task("open", &["a"], 0),
            task("later-done", &["a"], 1),
        ];
        let dropped = drop_finished_head(&mut tasks);
        assert_eq!(dropped, vec!["done", "empty"]);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["open", "later-done"]);
    }

    #[test]
    fn cursor_past_end_counts_as_finished() {
        let t = task("t", &["a"], 5);
        assert!(t.is_finished());
        assert_eq!(t.current(), None);
    }

    #[test]
    fn missing_cursor_defaults_to_zero() {
        let t: Task = serde_json::from_str(r#"{"id":"t","steps":["a"]}"#).expect("parse");
        assert_eq!(t.current_step, 0);
    }
}
