//! File capabilities: append/overwrite, read, and model-assisted rewrite.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{Capability, DispatchError, ToolContext, ToolOutput, optional_str, required_str};
use crate::core::message::{ArgMap, Message};
use crate::io::memory_log::MemoryLog;
use crate::io::prompt::render_smart_modify;
use crate::provider::{ChatProvider, ChatRequest};

/// Appends to (or overwrites) a file, creating parent directories.
pub struct WriteFile {
    ctx: ToolContext,
}

impl WriteFile {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Capability for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Append content to a file or create it, creating parent directories if needed. \
         Use mode \"overwrite\" to replace the file instead."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path (supports ~ for home)"},
                "content": {"type": "string", "description": "Content to write"},
                "mode": {"type": "string", "enum": ["append", "overwrite"]}
            },
            "required": ["path", "content"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let path = self.ctx.resolve(required_str(args, "path")?);
        let content = required_str(args, "content")?;
        let overwrite = optional_str(args, "mode")? == Some("overwrite");

        ensure_parent(&path)?;
        if overwrite {
            fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
            debug!(path = %path.display(), bytes = content.len(), "file overwritten");
            return Ok(ToolOutput::Text(format!("Wrote content to {}", path.display())));
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("append {}", path.display()))?;
        debug!(path = %path.display(), bytes = content.len(), "content appended");
        Ok(ToolOutput::Text(format!("Appended content to {}", path.display())))
    }
}

/// Reads a text file, or lists a directory as a JSON array of names.
pub struct ReadFile {
    ctx: ToolContext,
}

impl ReadFile {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Capability for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "If the path is a file, read its content. If it is a directory, return a JSON list of files in it"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let path = self.ctx.resolve(required_str(args, "path")?);
        if path.is_dir() {
            let mut names = Vec::new();
            for entry in fs::read_dir(&path).with_context(|| format!("list {}", path.display()))? {
                let entry = entry.with_context(|| format!("list {}", path.display()))?;
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            return Ok(ToolOutput::Json(json!(names)));
        }
        if !path.is_file() {
            return Err(DispatchError::HandlerExecutionError(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(ToolOutput::Text(text))
    }
}

/// Asks the model to rewrite a file according to instructions.
pub struct SmartModifyFile {
    ctx: ToolContext,
}

impl SmartModifyFile {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Capability for SmartModifyFile {
    fn name(&self) -> &str {
        "smart_modify_file"
    }

    fn description(&self) -> &str {
        "Read a file, apply high-level instructions via the LLM, and overwrite it"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to update (supports ~ for home)"},
                "instructions": {
                    "type": "string",
                    "description": "Natural-language description of how to change the file"
                }
            },
            "required": ["path", "instructions"]
        })
    }

    #[instrument(skip_all)]
    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let path = self.ctx.resolve(required_str(args, "path")?);
        let instructions = required_str(args, "instructions")?;
        if !path.is_file() {
            return Err(DispatchError::HandlerExecutionError(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let original =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let prompt = render_smart_modify(&original, instructions)?;
        let reply = ask_model(&self.ctx.provider, &self.ctx.memory, prompt)?;
        let updated = strip_code_fence(reply.text());
        if reply.function_call.is_some() || updated.trim().is_empty() {
            return Err(DispatchError::HandlerExecutionError(
                "model returned no file content".to_string(),
            ));
        }
        fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;
        Ok(ToolOutput::Text(format!("Smart-modified {}", path.display())))
    }
}

/// Single model call without functions, logged to session memory.
pub(crate) fn ask_model(
    provider: &Rc<dyn ChatProvider>,
    memory: &MemoryLog,
    prompt: String,
) -> Result<Message, DispatchError> {
    let user = Message::user(prompt);
    let request = ChatRequest {
        messages: vec![user.clone()],
        functions: Vec::new(),
        memory: memory.load(),
    };
    let reply = provider
        .complete(&request)
        .map_err(|err| DispatchError::HandlerExecutionError(err.to_string()))?;
    memory.append(&user)?;
    memory.append(&reply)?;
    Ok(reply)
}

fn ensure_parent(path: &Path) -> Result<(), DispatchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Remove one surrounding ```-fence if the model wrapped the whole file.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text.to_string();
    };
    // Drop the info string (e.g. "rust") on the opening line.
    body.split_once('\n').map_or("", |(_, b)| b).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, call_reply, tool_context};

    fn args(value: Value) -> ArgMap {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn write_file_appends_and_creates_parents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = tool_context(temp.path(), ScriptedProvider::new(vec![]));
        let tool = WriteFile::new(&ctx);

        let out = tool
            .execute(&args(json!({"path": "a/b/notes.txt", "content": "hi"})))
            .expect("first write");
        tool.execute(&args(json!({"path": "a/b/notes.txt", "content": " there"})))
            .expect("second write");

        let path = temp.path().join("a/b/notes.txt");
        assert_eq!(out.into_text(), format!("Appended content to {}", path.display()));
        assert_eq!(fs::read_to_string(path).expect("read"), "hi there");
    }

    #[test]
    fn write_file_overwrite_replaces_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = tool_context(temp.path(), ScriptedProvider::new(vec![]));
        fs::write(temp.path().join("t.json"), "[]\n").expect("seed");

        WriteFile::new(&ctx)
            .execute(&args(json!({"path": "t.json", "content": "[1]", "mode": "overwrite"})))
            .expect("overwrite");
        assert_eq!(fs::read_to_string(temp.path().join("t.json")).expect("read"), "[1]");
    }

    #[test]
    fn read_file_lists_directories_as_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = tool_context(temp.path(), ScriptedProvider::new(vec![]));
        fs::create_dir(temp.path().join("d")).expect("mkdir");
        fs::write(temp.path().join("d/b.txt"), "b").expect("write");
        fs::write(temp.path().join("d/a.txt"), "a").expect("write");

        let tool = ReadFile::new(&ctx);
        let listing = tool.execute(&args(json!({"path": "d"}))).expect("list");
        assert_eq!(listing, ToolOutput::Json(json!(["a.txt", "b.txt"])));
        let text = tool.execute(&args(json!({"path": "d/a.txt"}))).expect("read");
        assert_eq!(text, ToolOutput::Text("a".to_string()));
    }

    #[test]
    fn read_file_missing_is_execution_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = tool_context(temp.path(), ScriptedProvider::new(vec![]));
        let err = ReadFile::new(&ctx)
            .execute(&args(json!({"path": "nope.txt"})))
            .unwrap_err();
        assert!(matches!(err, DispatchError::HandlerExecutionError(_)));
        assert!(err.to_string().contains("file not found"));
    }

    /// Verifies the rewrite prompt and reply are logged to session memory and
    /// a fenced reply is unwrapped before writing.
    #[test]
    fn smart_modify_rewrites_through_the_model() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = ScriptedProvider::new(vec![Message::assistant("```rust\nfn main() {}\n```")]);
        let ctx = tool_context(temp.path(), provider.clone());
        fs::write(temp.path().join("main.rs"), "fn main(){}").expect("seed");

        let out = SmartModifyFile::new(&ctx)
            .execute(&args(json!({"path": "main.rs", "instructions": "format it"})))
            .expect("modify");

        assert!(out.into_text().starts_with("Smart-modified "));
        assert_eq!(
            fs::read_to_string(temp.path().join("main.rs")).expect("read"),
            "fn main() {}\n"
        );
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0].text().contains("fn main(){}"));
        assert!(requests[0].functions.is_empty());
        assert_eq!(ctx.memory.load().len(), 2);
    }

    /// Verifies a reply without file text leaves the file untouched.
    #[test]
    fn smart_modify_keeps_file_when_reply_has_no_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let original = "fn main() { important(); }\n";
        fs::write(temp.path().join("main.rs"), original).expect("seed");
        let provider = ScriptedProvider::new(vec![
            call_reply("read_file", json!({"path": "main.rs"})),
            Message::assistant("```\n```"),
        ]);
        let ctx = tool_context(temp.path(), provider);
        let tool = SmartModifyFile::new(&ctx);

        for _ in 0..2 {
            let err = tool
                .execute(&args(json!({"path": "main.rs", "instructions": "refactor"})))
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                DispatchError::HandlerExecutionError("model returned no file content".to_string())
                    .to_string()
            );
            assert_eq!(
                fs::read_to_string(temp.path().join("main.rs")).expect("read"),
                original
            );
        }
    }

    #[test]
    fn strip_code_fence_leaves_plain_text() {
        assert_eq!(strip_code_fence("plain"), "plain");
        assert_eq!(strip_code_fence("```\nx\n```"), "x\n");
    }
}
