//! Planning and search capabilities.

use serde_json::{Value, json};

use super::files::ask_model;
use super::{Capability, DispatchError, ToolContext, ToolOutput, optional_usize, required_str};
use crate::core::message::ArgMap;
use crate::io::prompt::render_outline_plan;

const DEFAULT_SEARCH_RESULTS: usize = 5;

/// Asks the model for a numbered plan.
pub struct OutlinePlan {
    ctx: ToolContext,
}

impl OutlinePlan {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Capability for OutlinePlan {
    fn name(&self) -> &str {
        "outline_plan"
    }

    fn description(&self) -> &str {
        "Produce a numbered, step-by-step plan for a task given some context"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "context": {"type": "string"},
                "task_description": {"type": "string"}
            },
            "required": ["context", "task_description"]
        })
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let prompt = render_outline_plan(
            required_str(args, "context")?,
            required_str(args, "task_description")?,
        )?;
        let reply = ask_model(&self.ctx.provider, &self.ctx.memory, prompt)?;
        Ok(ToolOutput::Text(reply.text().to_string()))
    }
}

/// Substring search over the reference directory.
pub struct SemanticSearch {
    ctx: ToolContext,
}

impl SemanticSearch {
    pub fn new(ctx: &ToolContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Capability for SemanticSearch {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Search local reference files; returns path:snippet matches"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "top_k": {"type": "integer", "minimum": 1}
            },
            "required": ["query"]
        })
    }

    fn execute(&self, args: &ArgMap) -> Result<ToolOutput, DispatchError> {
        let query = required_str(args, "query")?;
        let top_k = optional_usize(args, "top_k")?.unwrap_or(DEFAULT_SEARCH_RESULTS);
        let hits = self.ctx.retriever.search_snippets(query, top_k);
        Ok(ToolOutput::Json(json!(hits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use crate::test_support::{ScriptedProvider, tool_context};
    use std::fs;

    fn args(value: Value) -> ArgMap {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn outline_plan_returns_model_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let provider = ScriptedProvider::new(vec![Message::assistant("1. write tests\n2. ship")]);
        let ctx = tool_context(temp.path(), provider.clone());

        let out = OutlinePlan::new(&ctx)
            .execute(&args(json!({"context": "rust crate", "task_description": "add ci"})))
            .expect("plan");
        assert_eq!(out.into_text(), "1. write tests\n2. ship");
        let sent = provider.requests()[0].messages[0].text().to_string();
        assert!(sent.contains("Your task:\nadd ci"));
    }

    #[test]
    fn semantic_search_lists_matches() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("guide.md"), "How to configure the widget.").expect("write");
        let ctx = tool_context(temp.path(), ScriptedProvider::new(vec![]));

        let out = SemanticSearch::new(&ctx)
            .execute(&args(json!({"query": "widget", "top_k": 3})))
            .expect("search");
        let ToolOutput::Json(Value::Array(hits)) = out else {
            panic!("json array expected");
        };
        assert_eq!(hits.len(), 1);
        assert!(hits[0].as_str().expect("str").starts_with("guide.md:"));
    }
}
