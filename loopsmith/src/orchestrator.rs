//! Two-phase prompt protocol: validate, then execute.
//!
//! Phase one sends the prompt with the fixed validation rules and never runs
//! a tool. Phase two presents the phase-one text as validation results and
//! dispatches any function call the model makes. Every message sent or
//! received is appended to the session memory exactly once, in order.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::message::{FunctionCall, Message};
use crate::core::rules::render_rules;
use crate::io::memory_log::MemoryLog;
use crate::provider::{ChatProvider, ChatRequest};
use crate::tools::FunctionRegistry;

/// Returned by [`PromptOrchestrator::run`] when the model neither calls a
/// function nor says anything.
pub const NO_ACTION: &str = "No action taken";

/// Header of the phase-two system message.
pub const VALIDATION_RESULTS_HEADER: &str = "VALIDATION RESULTS:\n";

pub struct PromptOrchestrator<'a> {
    provider: &'a dyn ChatProvider,
    registry: &'a FunctionRegistry,
    memory: &'a MemoryLog,
    rules: &'a [&'a str],
}

impl<'a> PromptOrchestrator<'a> {
    pub fn new(
        provider: &'a dyn ChatProvider,
        registry: &'a FunctionRegistry,
        memory: &'a MemoryLog,
        rules: &'a [&'a str],
    ) -> Self {
        Self {
            provider,
            registry,
            memory,
            rules,
        }
    }

    /// Phase one: one model call under the validation rules.
    ///
    /// Returns the reply as-is. A function call in the reply is not run.
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub fn validate(&self, prompt: &str, context: Option<&str>) -> Result<Message> {
        let mut messages = Vec::new();
        if !self.rules.is_empty() {
            messages.push(Message::system(render_rules(self.rules)));
        }
        let reply = self.exchange(messages, prompt, context).context("validation call")?;
        debug!(
            function_call = reply.function_call.as_ref().map(|c| c.name.as_str()),
            "validation reply"
        );
        Ok(reply)
    }

    /// Both phases. Returns the dispatch result if the model called a
    /// function, otherwise its text, otherwise [`NO_ACTION`].
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub fn run(&self, prompt: &str, context: Option<&str>) -> Result<String> {
        let validation = self.validate(prompt, context)?;
        let messages = vec![Message::system(format!(
            "{VALIDATION_RESULTS_HEADER}{}",
            validation.text()
        ))];
        let reply = self.exchange(messages, prompt, context).context("execution call")?;

        if let Some(call) = &reply.function_call {
            return self.execute_call(call);
        }
        let text = reply.text().trim();
        if text.is_empty() {
            return Ok(NO_ACTION.to_string());
        }
        Ok(text.to_string())
    }

    /// Dispatch `call` and log the result as a `tool` message.
    pub fn execute_call(&self, call: &FunctionCall) -> Result<String> {
        info!(function = %call.name, "dispatching function call");
        let result = self.registry.dispatch(call);
        self.memory.append(&Message::tool_result(call, result.clone()))?;
        Ok(result)
    }

    /// One model call: `leading` system messages, optional context, then the
    /// prompt. The prompt is logged before the call and the reply after it.
    fn exchange(&self, mut messages: Vec<Message>, prompt: &str, context: Option<&str>) -> Result<Message> {
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            messages.push(Message::system(context));
        }
        let user = Message::user(prompt);
        messages.push(user.clone());

        let memory = self.memory.load();
        self.memory.append(&user)?;
        let request = ChatRequest {
            messages,
            functions: self.registry.schemas(),
            memory,
        };
        let reply = self
            .provider
            .complete(&request)
            .with_context(|| format!("provider {}", self.provider.name()))?;
        self.memory.append(&reply)?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::core::rules::VALIDATION_RULES;
    use crate::test_support::{RecordingCapability, ScriptedProvider, call_reply};
    use serde_json::json;

    struct Fixture {
        _temp: tempfile::TempDir,
        provider: ScriptedProvider,
        registry: FunctionRegistry,
        memory: MemoryLog,
        recorder: RecordingCapability,
    }

    fn fixture(replies: Vec<Message>) -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir");
        let memory = MemoryLog::new(temp.path().join("memory.json"));
        let recorder = RecordingCapability::succeeding("write_file", "Appended content to notes.txt");
        let mut registry = FunctionRegistry::new();
        registry.register(recorder.clone()).expect("register");
        Fixture {
            _temp: temp,
            provider: ScriptedProvider::new(replies),
            registry,
            memory,
            recorder,
        }
    }

    impl Fixture {
        fn orchestrator(&self) -> PromptOrchestrator<'_> {
            PromptOrchestrator::new(&self.provider, &self.registry, &self.memory, VALIDATION_RULES)
        }
    }

    /// Verifies the validation call happens first and its text reaches the
    /// execution call verbatim.
    #[test]
    fn execution_sees_validation_text_verbatim() {
        let fx = fixture(vec![
            Message::assistant("Prompt is safe.\nProceed with write_file."),
            call_reply("write_file", json!({"path": "notes.txt", "content": "hi"})),
        ]);

        let result = fx.orchestrator().run("create notes", Some("ctx")).expect("run");
        assert_eq!(result, "Appended content to notes.txt");

        let requests = fx.provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].messages[0].text().starts_with("VALIDATION RULES:\n"));
        assert_eq!(
            requests[1].messages[0].text(),
            "VALIDATION RESULTS:\nPrompt is safe.\nProceed with write_file."
        );
        assert_eq!(requests[1].messages[1].text(), "ctx");
        assert_eq!(requests[1].messages[2], Message::user("create notes"));
        // Phase two sees phase one in memory.
        assert_eq!(requests[0].memory.len(), 0);
        assert_eq!(requests[1].memory.len(), 2);
        assert_eq!(fx.recorder.calls().len(), 1);
    }

    #[test]
    fn memory_records_both_phases_and_tool_result_in_order() {
        let fx = fixture(vec![
            Message::assistant("ok"),
            call_reply("write_file", json!({"path": "notes.txt", "content": "hi"})),
        ]);
        fx.orchestrator().run("create notes", None).expect("run");

        let log = fx.memory.load();
        let roles: Vec<Role> = log.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant, Role::Tool]
        );
        assert_eq!(log[4].name.as_deref(), Some("write_file"));
        assert_eq!(log[4].text(), "Appended content to notes.txt");
    }

    #[test]
    fn validation_never_dispatches() {
        let fx = fixture(vec![call_reply("write_file", json!({"path": "x", "content": "y"}))]);
        let reply = fx.orchestrator().validate("go", None).expect("validate");
        assert!(reply.function_call.is_some());
        assert!(fx.recorder.calls().is_empty());
        assert_eq!(fx.memory.load().len(), 2);
    }

    #[test]
    fn empty_execution_reply_falls_back_to_no_action() {
        let fx = fixture(vec![Message::assistant("fine"), Message::assistant("  ")]);
        let out = fx.orchestrator().run("noop", None).expect("run");
        assert_eq!(out, NO_ACTION);
    }

    #[test]
    fn text_execution_reply_is_returned() {
        let fx = fixture(vec![Message::assistant("fine"), Message::assistant("All done.")]);
        assert_eq!(fx.orchestrator().run("noop", None).expect("run"), "All done.");
    }

    #[test]
    fn no_rules_means_no_rules_message() {
        let fx = fixture(vec![Message::assistant("fine")]);
        PromptOrchestrator::new(&fx.provider, &fx.registry, &fx.memory, &[])
            .validate("hello", None)
            .expect("validate");
        let requests = fx.provider.requests();
        assert_eq!(requests[0].messages, vec![Message::user("hello")]);
    }

    #[test]
    fn provider_failure_is_an_error_and_logs_the_prompt() {
        let fx = fixture(vec![]);
        let err = fx.orchestrator().run("hello", None).unwrap_err();
        assert!(format!("{err:#}").contains("validation call"));
        assert_eq!(fx.memory.load(), vec![Message::user("hello")]);
    }
}
