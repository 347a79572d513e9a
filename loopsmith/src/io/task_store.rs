//! Task list load/save for `.loopsmith/tasks.json`.

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::core::task::Task;
use crate::io::json_file::{read_or_default, write_atomic};

/// Load the task list. Missing or malformed files load as an empty list.
pub fn load_tasks(path: &Path) -> Vec<Task> {
    let tasks: Vec<Task> = read_or_default(path);
    debug!(path = %path.display(), count = tasks.len(), "loaded tasks");
    tasks
}

/// Rewrite the whole task list.
pub fn write_tasks(path: &Path, tasks: &[Task]) -> Result<()> {
    debug!(path = %path.display(), count = tasks.len(), "writing tasks");
    write_atomic(path, tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_list_serializes_as_brackets() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tasks.json");
        write_tasks(&path, &[]).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "[]\n");
    }

    #[test]
    fn tasks_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tasks.json");
        let mut task = Task::new("t1", vec!["a".to_string(), "b".to_string()]);
        task.current_step = 1;
        write_tasks(&path, std::slice::from_ref(&task)).expect("write");
        assert_eq!(load_tasks(&path), vec![task]);
    }
}
