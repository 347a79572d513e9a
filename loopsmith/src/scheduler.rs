//! Task loop: run the head task's current step, advance on success, repeat.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info, instrument, warn};

use crate::core::message::FunctionCall;
use crate::core::outcome::is_failure;
use crate::core::task::{Advance, advance_head, drop_finished_head};
use crate::core::tick::{SchedulerState, TickPlan, plan_tick};
use crate::io::activity_log::ActivityLog;
use crate::io::prompt::{StepPrompt, render_define_tasks, render_step};
use crate::io::retrieval::Retriever;
use crate::io::task_store::{load_tasks, write_tasks};
use crate::orchestrator::PromptOrchestrator;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Task list was empty; the model was asked to define tasks.
    TasksRequested { result: Option<String> },
    /// Task list still empty after the notice; the notice is re-armed.
    FallbackReset,
    /// Finished tasks were removed without a model call.
    Dropped { ids: Vec<String> },
    /// The step's function call succeeded and the cursor moved.
    Advanced { result: String, advance: Advance },
    /// The step's function call succeeded but the task list was rewritten
    /// during the call, so the cursor was left alone.
    ListChanged { result: String },
    /// The step's function call failed; the task stays at its step.
    Halted {
        task_id: String,
        step_index: usize,
        result: String,
    },
    /// The model answered with text instead of a function call.
    TextReply { task_id: String, text: String },
}

impl TickOutcome {
    /// Text worth showing the user for this tick.
    ///
    /// Text replies that ask a question are suppressed; the loop has nobody
    /// to answer them.
    pub fn display_text(&self) -> Option<&str> {
        match self {
            TickOutcome::TasksRequested { result } => result.as_deref(),
            TickOutcome::Advanced { result, .. }
            | TickOutcome::ListChanged { result }
            | TickOutcome::Halted { result, .. } => Some(result),
            TickOutcome::TextReply { text, .. } => {
                (!text.is_empty() && !text.contains('?')).then_some(text.as_str())
            }
            TickOutcome::FallbackReset | TickOutcome::Dropped { .. } => None,
        }
    }
}

/// Loop pacing and bounds.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub interval: Duration,
    /// Stop after this many ticks (unbounded if `None`).
    pub max_ticks: Option<u64>,
}

/// Summary of a [`TaskScheduler::run_loop`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub errors: u64,
}

pub struct TaskScheduler<'a> {
    orchestrator: PromptOrchestrator<'a>,
    retriever: &'a dyn Retriever,
    activity: &'a ActivityLog,
    tasks_path: PathBuf,
    context: Option<&'a str>,
    fallback_done: bool,
    state: SchedulerState,
}

impl<'a> TaskScheduler<'a> {
    pub fn new(
        orchestrator: PromptOrchestrator<'a>,
        retriever: &'a dyn Retriever,
        activity: &'a ActivityLog,
        tasks_path: impl Into<PathBuf>,
        context: Option<&'a str>,
    ) -> Self {
        Self {
            orchestrator,
            retriever,
            activity,
            tasks_path: tasks_path.into(),
            context,
            fallback_done: false,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Run one tick against the persisted task list.
    #[instrument(skip_all)]
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let mut tasks = load_tasks(&self.tasks_path);
        let outcome = match plan_tick(&tasks, self.fallback_done) {
            TickPlan::DefineTasks => {
                self.state = SchedulerState::Idle;
                self.fallback_done = true;
                let prompt = render_define_tasks(&self.tasks_path)?;
                let reply = self.orchestrator.validate(&prompt, self.context)?;
                let result = match &reply.function_call {
                    Some(call) => Some(self.dispatch_logged(call)?),
                    None => None,
                };
                TickOutcome::TasksRequested { result }
            }
            TickPlan::ResetFallback => {
                warn!("no tasks after the define-tasks notice; re-arming it");
                self.state = SchedulerState::Idle;
                self.fallback_done = false;
                TickOutcome::FallbackReset
            }
            TickPlan::DropFinished { .. } => {
                let ids = drop_finished_head(&mut tasks);
                write_tasks(&self.tasks_path, &tasks)?;
                info!(?ids, "dropped finished tasks");
                TickOutcome::Dropped { ids }
            }
            TickPlan::Execute {
                task_id,
                step_index,
                step,
            } => {
                self.fallback_done = false;
                self.state = SchedulerState::Executing {
                    task_id: task_id.clone(),
                    step_index,
                };
                let step_count = tasks.first().map_or(0, |t| t.steps.len());
                self.execute_step(task_id, step_index, &step, step_count)?
            }
        };
        self.state = SchedulerState::Sleeping;
        Ok(outcome)
    }

    fn execute_step(
        &mut self,
        task_id: String,
        step_index: usize,
        step: &str,
        step_count: usize,
    ) -> Result<TickOutcome> {
        let fragments = self.retriever.retrieve(step);
        debug!(task_id = %task_id, step_index, fragments = fragments.len(), "executing step");
        let prompt = render_step(&StepPrompt {
            task_id: &task_id,
            step,
            step_index,
            step_count,
            fragments: &fragments,
        })?;
        let reply = self.orchestrator.validate(&prompt, self.context)?;

        let Some(call) = &reply.function_call else {
            return Ok(TickOutcome::TextReply {
                task_id,
                text: reply.text().trim().to_string(),
            });
        };

        let result = self.dispatch_logged(call)?;
        if is_failure(&result) {
            warn!(task_id = %task_id, step_index, result = %result, "step failed; not advancing");
            return Ok(TickOutcome::Halted {
                task_id,
                step_index,
                result,
            });
        }

        self.state = SchedulerState::Advancing;
        // Reload: the call itself may have rewritten the task file.
        let mut tasks = load_tasks(&self.tasks_path);
        let unchanged = tasks
            .first()
            .is_some_and(|head| head.id == task_id && head.current_step == step_index);
        if !unchanged {
            warn!(task_id = %task_id, "task list changed during the step; cursor left as is");
            return Ok(TickOutcome::ListChanged { result });
        }
        let advance = advance_head(&mut tasks);
        write_tasks(&self.tasks_path, &tasks)?;
        info!(?advance, "step completed");
        Ok(TickOutcome::Advanced { result, advance })
    }

    fn dispatch_logged(&self, call: &FunctionCall) -> Result<String> {
        let args = call
            .arguments
            .normalize()
            .map(|map| serde_json::Value::Object(map).to_string())
            .unwrap_or_else(|_| format!("{:?}", call.arguments));
        self.activity.planning(&call.name, &args)?;
        let result = self.orchestrator.execute_call(call)?;
        self.activity.did(&call.name, &result)?;
        Ok(result)
    }

    /// Tick until `stop` is set or `max_ticks` is reached.
    ///
    /// A failing tick is logged and reported through `on_tick`; the loop
    /// carries on with the next one.
    pub fn run_loop<F>(&mut self, config: &LoopConfig, stop: &AtomicBool, mut on_tick: F) -> LoopSummary
    where
        F: FnMut(&Result<TickOutcome>),
    {
        let mut summary = LoopSummary { ticks: 0, errors: 0 };
        while !stop.load(Ordering::SeqCst) {
            summary.ticks += 1;
            let result = self.tick();
            if let Err(err) = &result {
                summary.errors += 1;
                error!(err = %format!("{err:#}"), "tick failed");
            }
            on_tick(&result);

            if config.max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }
            self.state = SchedulerState::Sleeping;
            sleep_unless_stopped(config.interval, stop);
        }
        info!(ticks = summary.ticks, errors = summary.errors, "loop finished");
        summary
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
