//! Capabilities the model can invoke, and the registry that dispatches them.
//!
//! Every capability declares a JSON schema for its arguments. The
//! [`FunctionRegistry`] validates arguments against that schema before the
//! handler runs, and turns every failure into a tagged text result so the
//! model sees it on the next turn.

pub mod checks;
pub mod files;
pub mod git;
pub mod memory;
pub mod planning;
pub mod registry;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;

use crate::core::message::ArgMap;
use crate::core::outcome;
use crate::io::config::AgentConfig;
use crate::io::git::GitCommandError;
use crate::io::kv_store::KvStore;
use crate::io::memory_log::MemoryLog;
use crate::io::process::CommandLimits;
use crate::io::retrieval::KeywordRetriever;
use crate::provider::{ChatProvider, FunctionSchema};

pub use registry::FunctionRegistry;

/// Result of a successful capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// Text form handed back to the model; JSON is serialized compactly.
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

/// Why a dispatch did not produce a result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no capability named '{0}'")]
    UnknownFunction(String),
    #[error("{0}")]
    InvalidArguments(String),
    #[error("{0}")]
    HandlerArgumentError(String),
    #[error("{0}")]
    HandlerExecutionError(String),
    #[error("{command} failed: {output}")]
    SubprocessFailure { command: String, output: String },
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownFunction(_) => "UnknownFunction",
            DispatchError::InvalidArguments(_) => "InvalidArguments",
            DispatchError::HandlerArgumentError(_) => "HandlerArgumentError",
            DispatchError::HandlerExecutionError(_) => "HandlerExecutionError",
            DispatchError::SubprocessFailure { .. } => "SubprocessFailure",
        }
    }

    /// `❌ <kind>: <detail>`
    pub fn tagged(&self) -> String {
        outcome::failure(self.kind(), self.to_string())
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(git) = err.downcast_ref::<GitCommandError>() {
            return DispatchError::SubprocessFailure {
                command: format!("git {}", git.command),
                output: git.output.clone(),
            };
        }
        DispatchError::HandlerExecutionError(format!("{err:#}"))
    }
}

/// An operation exposed to the model.
pub trait Capability {
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError>;
}

/// Shared collaborators handed to the built-in capabilities.
#[derive(Clone)]
pub struct ToolContext {
    /// Relative paths in arguments resolve against this directory.
    pub root: PathBuf,
    pub provider: Rc<dyn ChatProvider>,
    pub memory: MemoryLog,
    pub kv: KvStore,
    pub retriever: KeywordRetriever,
    pub limits: CommandLimits,
    pub tests_command: Vec<String>,
    pub lint_command: Vec<String>,
}

impl ToolContext {
    /// Context with command settings taken from `config`.
    pub fn from_config(
        root: &Path,
        config: &AgentConfig,
        provider: Rc<dyn ChatProvider>,
        memory: MemoryLog,
        kv: KvStore,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            provider,
            memory,
            kv,
            retriever: KeywordRetriever::new(root.join(&config.reference_dir), config.retrieval_top_k),
            limits: config.command_limits(),
            tests_command: config.tests.command.clone(),
            lint_command: config.lint.command.clone(),
        }
    }

    /// Expand `~` and resolve relative paths against the project root.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let expanded = shellexpand::tilde(raw);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Registry with every built-in capability, in advertised order.
pub fn default_registry(ctx: &ToolContext) -> Result<FunctionRegistry> {
    let mut registry = FunctionRegistry::new();
    registry.register(files::WriteFile::new(ctx))?;
    registry.register(files::ReadFile::new(ctx))?;
    registry.register(files::SmartModifyFile::new(ctx))?;
    registry.register(git::GitAdd::new(ctx))?;
    registry.register(git::GitCommit::new(ctx))?;
    registry.register(git::GitPush::new(ctx))?;
    registry.register(git::GitPull::new(ctx))?;
    registry.register(git::GitDiff::new(ctx))?;
    registry.register(git::CreateGitBranch::new(ctx))?;
    registry.register(memory::SaveMemory::new(ctx))?;
    registry.register(memory::LoadMemory::new(ctx))?;
    registry.register(checks::RunCheck::tests(ctx))?;
    registry.register(checks::RunCheck::linter(ctx))?;
    registry.register(planning::OutlinePlan::new(ctx))?;
    registry.register(planning::SemanticSearch::new(ctx))?;
    Ok(registry)
}

pub(crate) fn required_str<'a>(args: &'a ArgMap, key: &str) -> Result<&'a str, DispatchError> {
    optional_str(args, key)?.ok_or_else(|| {
        DispatchError::HandlerArgumentError(format!("missing required argument '{key}'"))
    })
}

pub(crate) fn optional_str<'a>(args: &'a ArgMap, key: &str) -> Result<Option<&'a str>, DispatchError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(DispatchError::HandlerArgumentError(format!(
            "argument '{key}' must be a string"
        ))),
    }
}

pub(crate) fn optional_bool(args: &ArgMap, key: &str) -> Result<Option<bool>, DispatchError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(_) => Err(DispatchError::HandlerArgumentError(format!(
            "argument '{key}' must be a boolean"
        ))),
    }
}

pub(crate) fn optional_usize(args: &ArgMap, key: &str) -> Result<Option<usize>, DispatchError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                DispatchError::HandlerArgumentError(format!(
                    "argument '{key}' must be a non-negative integer"
                ))
            }),
    }
}
