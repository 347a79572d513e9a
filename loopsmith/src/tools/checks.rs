//! Test and lint runners. The commands come from config, never from the model.

use serde_json::{Value, json};
use tracing::{info, instrument};

use super::{Capability, DispatchError, ToolContext, ToolOutput, optional_str};
use crate::core::message::ArgMap;
use crate::io::process::run_argv;

/// Runs a configured command in a folder and reports its output.
pub struct RunCheck {
    name: &'static str,
    description: &'static str,
    command: Vec<String>,
    ctx: ToolContext,
}

impl RunCheck {
    pub fn tests(ctx: &ToolContext) -> Self {
        Self::build(ctx, "run_tests", "Run the project's test suite in folder_path", &ctx.tests_command)
    }

    pub fn linter(ctx: &ToolContext) -> Self {
        Self::build(ctx, "run_linter", "Run the project's linter in folder_path", &ctx.lint_command)
    }

    fn build(
        ctx: &ToolContext,
        name: &'static str,
        description: &'static str,
        command: &[String],
    ) -> Self {
        Self {
            name,
            description,
            command: command.to_vec(),
            ctx: ctx.clone(),
        }
    }
}

impl Capability for RunCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"folder_path": {"type": "string"}}
        })
    }

    #[instrument(skip_all, fields(check = self.name))]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let folder = optional_str(args, "folder_path")?
            .map_or_else(|| self.ctx.root.clone(), |raw| self.ctx.resolve(raw));
        if !folder.is_dir() {
            return Err(DispatchError::HandlerExecutionError(format!(
                "folder not found: {}",
                folder.display()
            )));
        }
        let output = run_argv(&self.command, &folder, self.ctx.limits)?;
        let text = output.combined_text();
        info!(success = output.success(), "check finished");
        if !output.success() {
            return Err(DispatchError::SubprocessFailure {
                command: self.command.join(" "),
                output: text,
            });
        }
        Ok(ToolOutput::Text(text))
    }
}
