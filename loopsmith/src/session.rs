//! Session lifecycle: config, provider, registry, and memory wired together.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::rules::VALIDATION_RULES;
use crate::io::activity_log::ActivityLog;
use crate::io::config::{AgentConfig, load_config_with_env};
use crate::io::init::AgentPaths;
use crate::io::kv_store::KvStore;
use crate::io::memory_log::MemoryLog;
use crate::io::retrieval::KeywordRetriever;
use crate::orchestrator::PromptOrchestrator;
use crate::provider::{ChatProvider, build_provider};
use crate::tools::{FunctionRegistry, ToolContext, default_registry};

/// How to open a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Keep the previous run's session memory instead of starting empty.
    pub keep_memory: bool,
    /// File whose text is sent as a system message with every prompt.
    pub context_file: Option<PathBuf>,
}

/// One agent session rooted at a project directory.
pub struct Session {
    paths: AgentPaths,
    config: AgentConfig,
    provider: Rc<dyn ChatProvider>,
    registry: FunctionRegistry,
    memory: MemoryLog,
    activity: ActivityLog,
    context: Option<String>,
}

impl Session {
    /// Open a session using `.loopsmith/config.toml` and the environment.
    pub fn open(root: &Path, options: &SessionOptions) -> Result<Self> {
        let paths = AgentPaths::new(root);
        let config = load_config_with_env(&paths.config_path)?;
        let provider: Rc<dyn ChatProvider> = Rc::from(build_provider(&config)?);
        Self::with_provider(paths, config, provider, options)
    }

    /// Open a session with an explicit provider.
    #[instrument(skip_all, fields(root = %paths.root.display(), keep_memory = options.keep_memory))]
    pub fn with_provider(
        paths: AgentPaths,
        config: AgentConfig,
        provider: Rc<dyn ChatProvider>,
        options: &SessionOptions,
    ) -> Result<Self> {
        let context = match &options.context_file {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("read context file {}", path.display()))?,
            ),
            None => None,
        };

        let memory = MemoryLog::new(&paths.memory_path);
        if !options.keep_memory {
            memory.reset()?;
        }
        let ctx = ToolContext::from_config(
            &paths.root,
            &config,
            Rc::clone(&provider),
            memory.clone(),
            KvStore::new(&paths.kv_path),
        );
        let registry = default_registry(&ctx)?;
        let activity = ActivityLog::new(&paths.activity_log_path);
        activity.record("SESSION: started")?;
        info!(provider = provider.name(), functions = registry.names().len(), "session opened");

        Ok(Self {
            paths,
            config,
            provider,
            registry,
            memory,
            activity,
            context,
        })
    }

    pub fn orchestrator(&self) -> PromptOrchestrator<'_> {
        PromptOrchestrator::new(&*self.provider, &self.registry, &self.memory, VALIDATION_RULES)
    }

    /// Retriever over the configured reference directory.
    pub fn retriever(&self) -> KeywordRetriever {
        KeywordRetriever::new(
            self.paths.root.join(&self.config.reference_dir),
            self.config.retrieval_top_k,
        )
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryLog {
        &self.memory
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Record the end of the session.
    pub fn close(self) -> Result<()> {
        debug!(messages = self.memory.load().len(), "closing session");
        self.activity.record("SESSION: closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::test_support::ScriptedProvider;

    fn open(root: &Path, options: &SessionOptions) -> Result<Session> {
        Session::with_provider(
            AgentPaths::new(root),
            AgentConfig::default(),
            Rc::new(ScriptedProvider::new(vec![])),
            options,
        )
    }

    /// Verifies a default session starts with empty memory even when a
    /// previous run left messages behind.
    #[test]
    fn default_session_starts_with_empty_memory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = MemoryLog::new(AgentPaths::new(temp.path()).memory_path);
        log.append(&Message::user("old")).expect("seed");

        let session = open(temp.path(), &SessionOptions::default()).expect("open");
        assert!(session.memory().load().is_empty());
    }

    #[test]
    fn keep_memory_carries_previous_run_over() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = MemoryLog::new(AgentPaths::new(temp.path()).memory_path);
        log.append(&Message::user("old")).expect("seed");

        let kept = open(
            temp.path(),
            &SessionOptions {
                keep_memory: true,
                ..SessionOptions::default()
            },
        )
        .expect("open");
        assert_eq!(kept.memory().load(), vec![Message::user("old")]);
    }

    #[test]
    fn registry_advertises_every_builtin_capability() {
        let temp = tempfile::tempdir().expect("tempdir");
        let session = open(temp.path(), &SessionOptions::default()).expect("open");
        assert_eq!(
            session.registry().names(),
            vec![
                "write_file",
                "read_file",
                "smart_modify_file",
                "git_add",
                "git_commit",
                "git_push",
                "git_pull",
                "git_diff",
                "create_git_branch",
                "save_memory",
                "load_memory",
                "run_tests",
                "run_linter",
                "outline_plan",
                "semantic_search",
            ]
        );
    }

    #[test]
    fn missing_context_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = open(
            temp.path(),
            &SessionOptions {
                keep_memory: false,
                context_file: Some(temp.path().join("missing.md")),
            },
        )
        .err()
        .expect("error");
        assert!(err.to_string().contains("read context file"));
    }

    #[test]
    fn open_and_close_are_recorded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let session = open(temp.path(), &SessionOptions::default()).expect("open");
        let log_path = session.activity().path().to_path_buf();
        session.close().expect("close");

        let text = fs::read_to_string(log_path).expect("read");
        assert!(text.contains("SESSION: started"));
        assert!(text.contains("SESSION: closed"));
    }
}
