//! Deterministic tick planning for the task scheduler.
//!
//! The scheduler loads the task list, asks [`plan_tick`] what to do, and
//! performs the side effects itself.

use crate::core::task::Task;

/// Observable scheduler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// No tasks to run.
    Idle,
    /// Driving a step of the head task through the model.
    Executing { task_id: String, step_index: usize },
    /// Persisting the cursor after a successful step.
    Advancing,
    /// Waiting for the next tick.
    Sleeping,
}

/// What a tick should do given the current task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickPlan {
    /// Task list empty and the notice has not been sent: ask the model to
    /// define tasks.
    DefineTasks,
    /// Task list empty and the notice was already sent: clear the flag and
    /// keep polling.
    ResetFallback,
    /// The head task has no remaining steps: drop it without a model call.
    DropFinished { id: String },
    /// Run the step under the head task's cursor.
    Execute {
        task_id: String,
        step_index: usize,
        step: String,
    },
}

/// Decide the next action from the task list and the fallback flag.
pub fn plan_tick(tasks: &[Task], fallback_done: bool) -> TickPlan {
    let Some(head) = tasks.first() else {
        return if fallback_done {
            TickPlan::ResetFallback
        } else {
            TickPlan::DefineTasks
        };
    };
    match head.current() {
        Some(step) => TickPlan::Execute {
            task_id: head.id.clone(),
            step_index: head.current_step,
            step: step.to_string(),
        },
        None => TickPlan::DropFinished {
            id: head.id.clone(),
        },
    }
}
