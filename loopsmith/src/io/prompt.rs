//! Prompt rendering for the scheduler and the model-backed capabilities.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const STEP_TEMPLATE: &str = include_str!("prompts/step.md");
const DEFINE_TASKS_TEMPLATE: &str = include_str!("prompts/define_tasks.md");
const SMART_MODIFY_TEMPLATE: &str = include_str!("prompts/smart_modify.md");
const OUTLINE_PLAN_TEMPLATE: &str = include_str!("prompts/outline_plan.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("step", STEP_TEMPLATE),
            ("define_tasks", DEFINE_TASKS_TEMPLATE),
            ("smart_modify", SMART_MODIFY_TEMPLATE),
            ("outline_plan", OUTLINE_PLAN_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load template {name}"))?;
        }
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render template {name}"))
    }
}

/// Inputs for one scheduler step.
#[derive(Debug, Clone)]
pub struct StepPrompt<'a> {
    pub task_id: &'a str,
    pub step: &'a str,
    /// Zero-based cursor of the step being executed.
    pub step_index: usize,
    pub step_count: usize,
    /// Retrieved reference fragments, already formatted.
    pub fragments: &'a [String],
}

/// Render the prompt that asks the model for one tool call advancing a step.
pub fn render_step(input: &StepPrompt<'_>) -> Result<String> {
    PromptEngine::new()?.render(
        "step",
        context! {
            task_id => input.task_id,
            step => input.step.trim(),
            step_number => input.step_index + 1,
            step_count => input.step_count,
            fragments => input.fragments,
        },
    )
}

/// Render the one-time notice asking the model to populate the task file.
pub fn render_define_tasks(tasks_path: &Path) -> Result<String> {
    PromptEngine::new()?.render(
        "define_tasks",
        context! { tasks_path => tasks_path.display().to_string() },
    )
}

pub fn render_smart_modify(original: &str, instructions: &str) -> Result<String> {
    PromptEngine::new()?.render(
        "smart_modify",
        context! { original => original, instructions => instructions.trim() },
    )
}

pub fn render_outline_plan(context_text: &str, task: &str) -> Result<String> {
    PromptEngine::new()?.render(
        "outline_plan",
        context! { context => context_text.trim(), task => task.trim() },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies reference fragments come before the step instruction.
    #[test]
    fn step_prompt_puts_fragments_first() {
        let fragments = vec!["== Document: a.md ==\nalpha\n== End document: a.md ==".to_string()];
        let prompt = render_step(&StepPrompt {
            task_id: "t1",
            step: "create file notes.txt",
            step_index: 0,
            step_count: 2,
            fragments: &fragments,
        })
        .expect("render");

        let doc_pos = prompt.find("== Document: a.md ==").expect("fragment");
        let step_pos = prompt.find("create file notes.txt").expect("step");
        assert!(doc_pos < step_pos);
        assert!(prompt.contains("task `t1`, step 1 of 2"));
        assert!(prompt.contains("Choose exactly one tool call"));
    }

    #[test]
    fn step_prompt_without_fragments_starts_with_instruction() {
        let prompt = render_step(&StepPrompt {
            task_id: "t1",
            step: "x",
            step_index: 0,
            step_count: 1,
            fragments: &[],
        })
        .expect("render");
        assert!(prompt.starts_with("You are an AI agent"));
    }

    #[test]
    fn define_tasks_names_the_task_file() {
        let prompt = render_define_tasks(Path::new("/w/.loopsmith/tasks.json")).expect("render");
        assert!(prompt.starts_with("No tasks."));
        assert!(prompt.contains("/w/.loopsmith/tasks.json"));
        assert!(prompt.contains("\"overwrite\""));
    }

    #[test]
    fn smart_modify_wraps_original_in_fence() {
        let prompt = render_smart_modify("fn main() {}", "add a comment").expect("render");
        assert!(prompt.starts_with("Here is the original file content:\n```\nfn main() {}\n```"));
        assert!(prompt.ends_with("Return the full, updated file content only."));
    }

    #[test]
    fn outline_plan_includes_context_and_task() {
        let prompt = render_outline_plan("a rust crate", "add tests").expect("render");
        assert!(prompt.contains("Context:\na rust crate"));
        assert!(prompt.contains("Your task:\nadd tests"));
    }
}
