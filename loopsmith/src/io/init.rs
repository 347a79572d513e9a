//! Canonical paths and scaffolding for `.loopsmith/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::config::{AgentConfig, write_config};

/// All canonical paths within `.loopsmith/` for a project root.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub memory_path: PathBuf,
    pub kv_path: PathBuf,
    pub tasks_path: PathBuf,
    pub flows_path: PathBuf,
    pub feedback_path: PathBuf,
    pub activity_log_path: PathBuf,
}

impl AgentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".loopsmith");
        Self {
            root: root.clone(),
            state_dir: state_dir.clone(),
            config_path: state_dir.join("config.toml"),
            memory_path: state_dir.join("memory.json"),
            kv_path: state_dir.join("kv.json"),
            tasks_path: state_dir.join("tasks.json"),
            flows_path: state_dir.join("flows.json"),
            feedback_path: state_dir.join("feedback.txt"),
            activity_log_path: state_dir.join("activity.log"),
        }
    }
}

/// Options for `init_workspace`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing agent-owned files.
    pub force: bool,
}

/// Create `.loopsmith/` scaffolding in `root`.
///
/// Fails if `.loopsmith/` already exists unless `options.force` is set.
pub fn init_workspace(root: &Path, options: &InitOptions) -> Result<AgentPaths> {
    let paths = AgentPaths::new(root);
    if paths.state_dir.exists() && !options.force {
        return Err(anyhow!(
            "init: .loopsmith already exists (use --force to overwrite)"
        ));
    }
    if paths.state_dir.exists() && !paths.state_dir.is_dir() {
        return Err(anyhow!("init: .loopsmith exists but is not a directory"));
    }

    debug!(root = %root.display(), force = options.force, "initializing workspace");
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create directory {}", paths.state_dir.display()))?;

    write_config(&paths.config_path, &AgentConfig::default())?;
    write_file(&paths.memory_path, EMPTY_LIST)?;
    write_file(&paths.tasks_path, EMPTY_LIST)?;
    write_file(&paths.flows_path, EMPTY_OBJECT)?;
    write_file(&paths.kv_path, EMPTY_OBJECT)?;
    write_file(&paths.state_dir.join(".gitignore"), STATE_GITIGNORE)?;

    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const EMPTY_LIST: &str = "[]\n";
const EMPTY_OBJECT: &str = "{}\n";
const STATE_GITIGNORE: &str = "memory.json\nactivity.log\n*.tmp\n";
