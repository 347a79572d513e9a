//! Named command flows persisted in `.loopsmith/flows.json`.
//!
//! A flow maps a name to an ordered list of commands. Commands are argv
//! lists executed without a shell; a legacy entry stored as one string is
//! split on whitespace when loaded.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::json_file::{read_or_default, write_atomic};

/// One stored command, in either accepted shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredCommand {
    Argv(Vec<String>),
    Line(String),
}

impl StoredCommand {
    fn into_argv(self) -> Vec<String> {
        match self {
            StoredCommand::Argv(argv) => argv,
            StoredCommand::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Flow name to ordered argv commands.
pub type Flows = BTreeMap<String, Vec<Vec<String>>>;

/// Load all flows, normalizing legacy string commands into argv lists.
pub fn load_flows(path: &Path) -> Flows {
    let raw: BTreeMap<String, Vec<StoredCommand>> = read_or_default(path);
    raw.into_iter()
        .map(|(name, commands)| {
            let argvs = commands
                .into_iter()
                .map(StoredCommand::into_argv)
                .filter(|argv| !argv.is_empty())
                .collect();
            (name, argvs)
        })
        .collect()
}

pub fn write_flows(path: &Path, flows: &Flows) -> Result<()> {
    write_atomic(path, flows)
}

/// Add or replace a flow.
pub fn define_flow(path: &Path, name: &str, commands: Vec<Vec<String>>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("flow name must not be empty"));
    }
    if commands.is_empty() || commands.iter().any(|argv| argv.is_empty()) {
        return Err(anyhow!("flow '{name}' needs at least one non-empty command"));
    }
    let mut flows = load_flows(path);
    flows.insert(name.to_string(), commands);
    write_flows(path, &flows)
}
