//! Test-only helpers: scripted providers, recording capabilities, scratch repos.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Command;
use std::rc::Rc;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::message::{ArgMap, FunctionCall, Message};
use crate::io::git::Git;
use crate::io::kv_store::KvStore;
use crate::io::memory_log::MemoryLog;
use crate::io::process::CommandLimits;
use crate::io::retrieval::KeywordRetriever;
use crate::provider::{ChatProvider, ChatRequest, ProviderCapabilities, ProviderError};
use crate::tools::{Capability, DispatchError, ToolContext, ToolOutput};

/// Provider that replays canned replies in order and records every request.
///
/// Clones share the script and the request log, so a test can keep a handle
/// after moving one copy into the code under test.
#[derive(Clone)]
pub struct ScriptedProvider {
    replies: Rc<RefCell<VecDeque<Result<Message, ProviderError>>>>,
    requests: Rc<RefCell<Vec<ChatRequest>>>,
    capabilities: ProviderCapabilities,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Message>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(replies: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            replies: Rc::new(RefCell::new(replies.into())),
            requests: Rc::new(RefCell::new(Vec::new())),
            capabilities: ProviderCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.borrow().clone()
    }
}

impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    fn complete(&self, request: &ChatRequest) -> Result<Message, ProviderError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".to_string())))
    }
}

/// Assistant reply that calls `name` with structured `args`.
pub fn call_reply(name: &str, args: Value) -> Message {
    Message::assistant_call(FunctionCall::new(name, args))
}

/// Capability that records its arguments and returns a fixed result.
#[derive(Clone)]
pub struct RecordingCapability {
    name: String,
    result: Result<String, String>,
    calls: Rc<RefCell<Vec<ArgMap>>>,
}

impl RecordingCapability {
    pub fn succeeding(name: &str, result: &str) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(result.to_string()),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Fails every call with a `HandlerExecutionError` carrying `detail`.
    pub fn failing(name: &str, detail: &str) -> Self {
        Self {
            result: Err(detail.to_string()),
            ..Self::succeeding(name, "")
        }
    }

    pub fn calls(&self) -> Vec<ArgMap> {
        self.calls.borrow().clone()
    }
}

impl Capability for RecordingCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Test capability"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        self.calls.borrow_mut().push(args.clone());
        match &self.result {
            Ok(text) => Ok(ToolOutput::Text(text.clone())),
            Err(detail) => Err(DispatchError::HandlerExecutionError(detail.clone())),
        }
    }
}

/// Tool context rooted at `root` with state files under `root/.loopsmith`.
pub fn tool_context(root: &Path, provider: ScriptedProvider) -> ToolContext {
    let state = root.join(".loopsmith");
    ToolContext {
        root: root.to_path_buf(),
        provider: Rc::new(provider),
        memory: MemoryLog::new(state.join("memory.json")),
        kv: KvStore::new(state.join("kv.json")),
        retriever: KeywordRetriever::new(root, 3),
        limits: CommandLimits::default(),
        tests_command: vec!["true".to_string()],
        lint_command: vec!["true".to_string()],
    }
}

/// Scratch git repository with one initial commit on `main`.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Self { dir };
        repo.git_cmd(&["init", "-q", "-b", "main"]);
        repo.git_cmd(&["config", "user.email", "test@example.com"]);
        repo.git_cmd(&["config", "user.name", "Test"]);
        repo.git_cmd(&["config", "commit.gpgsign", "false"]);
        std::fs::write(repo.path().join("README.md"), "test repo\n").expect("write readme");
        repo.git_cmd(&["add", "README.md"]);
        repo.git_cmd(&["commit", "-q", "-m", "initial"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self) -> Git {
        Git::new(self.path())
    }

    /// Run git in the repository, panicking on failure.
    pub fn git_cmd(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("spawn git");
        assert!(
            output.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}
