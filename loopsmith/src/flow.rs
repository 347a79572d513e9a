//! Running named command flows.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::io::flow_store::{Flows, define_flow, load_flows};
use crate::io::init::AgentPaths;
use crate::io::process::{CommandLimits, CommandOutput, run_argv};

/// One executed flow command.
#[derive(Debug)]
pub struct FlowStep {
    pub argv: Vec<String>,
    pub output: CommandOutput,
}

/// Result of [`run_flow`]. Execution stops at the first failing command.
#[derive(Debug)]
pub struct FlowRun {
    pub name: String,
    pub steps: Vec<FlowStep>,
    /// Commands that were not run because an earlier one failed.
    pub skipped: usize,
}

impl FlowRun {
    pub fn success(&self) -> bool {
        self.skipped == 0 && self.steps.iter().all(|s| s.output.success())
    }
}

/// Split `define` arguments into commands on standalone `;` tokens.
pub fn split_commands(args: &[String]) -> Vec<Vec<String>> {
    args.split(|arg| arg == ";")
        .filter(|argv| !argv.is_empty())
        .map(<[String]>::to_vec)
        .collect()
}

pub fn define(paths: &AgentPaths, name: &str, args: &[String]) -> Result<usize> {
    let commands = split_commands(args);
    let count = commands.len();
    define_flow(&paths.flows_path, name, commands)?;
    info!(name, commands = count, "flow defined");
    Ok(count)
}

pub fn list(paths: &AgentPaths) -> Flows {
    load_flows(&paths.flows_path)
}

/// Run the flow `name` from the project root, one command at a time.
#[instrument(skip_all, fields(name = %name))]
pub fn run_flow(paths: &AgentPaths, name: &str, limits: CommandLimits) -> Result<FlowRun> {
    let flows = load_flows(&paths.flows_path);
    let commands = flows
        .get(name)
        .ok_or_else(|| anyhow!("flow '{name}' not found"))?;
    run_commands(name, commands, &paths.root, limits)
}

fn run_commands(
    name: &str,
    commands: &[Vec<String>],
    workdir: &Path,
    limits: CommandLimits,
) -> Result<FlowRun> {
    let mut steps = Vec::new();
    for (index, argv) in commands.iter().enumerate() {
        let output = run_argv(argv, workdir, limits)?;
        let ok = output.success();
        steps.push(FlowStep {
            argv: argv.clone(),
            output,
        });
        if !ok {
            warn!(name, command = %argv.join(" "), "flow command failed");
            return Ok(FlowRun {
                name: name.to_string(),
                steps,
                skipped: commands.len() - index - 1,
            });
        }
    }
    Ok(FlowRun {
        name: name.to_string(),
        steps,
        skipped: 0,
    })
}
