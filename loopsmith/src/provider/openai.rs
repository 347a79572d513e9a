//! OpenAI-compatible chat-completions endpoint (hosted API or a local server).

use std::time::Duration;

use anyhow::Context;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use super::{ChatProvider, ChatRequest, ProviderCapabilities, ProviderError};
use crate::core::message::{FunctionCall, Message, RawArguments, Role};

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Connection settings for one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Label used in logs (`openai`, `alternate`).
    pub name: String,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub capabilities: ProviderCapabilities,
}

/// Blocking HTTP client for one endpoint.
pub struct OpenAiProvider {
    settings: EndpointSettings,
    client: reqwest::blocking::Client,
}

impl OpenAiProvider {
    pub fn new(settings: EndpointSettings) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .with_context(|| format!("build http client for {}", settings.name))?;
        Ok(Self { settings, client })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.settings.capabilities
    }

    #[instrument(skip_all, fields(provider = %self.settings.name, messages = request.messages.len()))]
    fn complete(&self, request: &ChatRequest) -> Result<Message, ProviderError> {
        let payload = build_payload(&self.settings.model, request, self.capabilities());
        let mut builder = self.client.post(self.endpoint_url()).json(&payload);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().map_err(|err| {
            warn!(err = %err, "request failed");
            ProviderError::Unavailable(err.to_string())
        })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| ProviderError::Unavailable(format!("read response body: {err}")))?;

        if status.is_client_error() {
            warn!(status = status.as_u16(), "request rejected");
            return Err(ProviderError::RequestRejected {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                truncate_chars(&body, MAX_ERROR_BODY_CHARS)
            )));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|err| ProviderError::InvalidResponse(format!("decode body: {err}")))?;
        let reply = parse_response(&value)?;
        debug!(
            function_call = reply.function_call.as_ref().map(|c| c.name.as_str()),
            "reply received"
        );
        Ok(reply)
    }
}

/// Build the chat-completions payload for `request`, shaped for an endpoint
/// with `capabilities`.
pub fn build_payload(model: &str, request: &ChatRequest, capabilities: ProviderCapabilities) -> Value {
    let (messages, memory) = request.shaped_for(capabilities);
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(model));
    payload.insert(
        "messages".to_string(),
        Value::Array(messages.iter().map(wire_message).collect()),
    );
    if !request.functions.is_empty() {
        payload.insert("functions".to_string(), json!(request.functions));
        payload.insert("function_call".to_string(), json!("auto"));
    }
    if let Some(memory) = memory {
        payload.insert(
            "memory".to_string(),
            Value::Array(memory.iter().map(wire_message).collect()),
        );
    }
    Value::Object(payload)
}

/// Convert a message to the legacy function-calling wire shape.
///
/// Tool results travel as `role: "function"` messages named after the
/// function that produced them.
fn wire_message(message: &Message) -> Value {
    let mut obj = Map::new();
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "function",
    };
    obj.insert("role".to_string(), json!(role));
    obj.insert(
        "content".to_string(),
        message.content.as_ref().map_or(Value::Null, |c| json!(c)),
    );
    match (&message.name, message.role) {
        (Some(name), _) => {
            obj.insert("name".to_string(), json!(name));
        }
        (None, Role::Tool) => {
            obj.insert("name".to_string(), json!("tool"));
        }
        (None, _) => {}
    }
    if let Some(call) = &message.function_call {
        obj.insert(
            "function_call".to_string(),
            json!({ "name": call.name, "arguments": encoded_arguments(&call.arguments) }),
        );
    }
    Value::Object(obj)
}

fn encoded_arguments(arguments: &RawArguments) -> String {
    match arguments {
        RawArguments::Encoded(text) => text.clone(),
        RawArguments::Structured(value) => value.to_string(),
    }
}

/// Extract the assistant reply from a chat-completions response body.
///
/// Accepts both the legacy `function_call` field and the first entry of
/// `tool_calls`.
pub fn parse_response(body: &Value) -> Result<Message, ProviderError> {
    let message = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let legacy_call = message.get("function_call").filter(|v| !v.is_null());
    let tool_call = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first());
    let function_call = match (legacy_call, tool_call) {
        (Some(call), _) => Some(parse_call(call, None)?),
        (None, Some(entry)) => {
            let id = entry.get("id").and_then(Value::as_str).map(str::to_string);
            let function = entry.get("function").ok_or_else(|| {
                ProviderError::InvalidResponse("tool call without function".to_string())
            })?;
            Some(parse_call(function, id)?)
        }
        (None, None) => None,
    };

    Ok(Message {
        role: Role::Assistant,
        content,
        name: None,
        function_call,
        tool_call_id: None,
    })
}

fn parse_call(value: &Value, id: Option<String>) -> Result<FunctionCall, ProviderError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("function call without name".to_string()))?;
    let arguments = match value.get("arguments") {
        Some(Value::String(text)) => RawArguments::Encoded(text.clone()),
        Some(other) => RawArguments::Structured(other.clone()),
        None => RawArguments::default(),
    };
    let id = id.or_else(|| value.get("id").and_then(Value::as_str).map(str::to_string));
    Ok(FunctionCall {
        name: name.to_string(),
        arguments,
        id,
    })
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FunctionSchema;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![Message::system("ctx"), Message::user("do it")],
            functions: vec![FunctionSchema {
                name: "write_file".to_string(),
                description: "write".to_string(),
                parameters: json!({"type": "object"}),
            }],
            memory: vec![Message::user("earlier")],
        }
    }

    #[test]
    fn payload_carries_functions_and_auto_selection() {
        let payload = build_payload("m", &request(), ProviderCapabilities::default());
        assert_eq!(payload["model"], "m");
        assert_eq!(payload["function_call"], "auto");
        assert_eq!(payload["functions"][0]["name"], "write_file");
        assert!(payload.get("memory").is_none());
        let first = payload["messages"][0]["content"].as_str().expect("content");
        assert!(first.starts_with("<MEMORY>\n"));
    }

    #[test]
    fn payload_passes_memory_inline_when_supported() {
        let payload = build_payload(
            "m",
            &request(),
            ProviderCapabilities {
                supports_inline_memory: true,
            },
        );
        assert_eq!(payload["memory"][0]["content"], "earlier");
        assert_eq!(payload["messages"][0]["content"], "ctx");
    }

    #[test]
    fn tool_results_are_sent_as_function_messages() {
        let call = FunctionCall::new("read_file", json!({"path": "a"}));
        let wire = wire_message(&Message::tool_result(&call, "body"));
        assert_eq!(wire["role"], "function");
        assert_eq!(wire["name"], "read_file");

        let wire = wire_message(&Message::assistant_call(call));
        assert_eq!(wire["function_call"]["arguments"], r#"{"path":"a"}"#);
        assert!(wire["content"].is_null());
    }

    #[test]
    fn parses_legacy_function_call() {
        let body = json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "function_call": {"name": "write_file", "arguments": "{\"path\":\"n.txt\"}"}
        }}]});
        let reply = parse_response(&body).expect("parse");
        let call = reply.function_call.expect("call");
        assert_eq!(call.name, "write_file");
        assert_eq!(call.arguments, RawArguments::Encoded("{\"path\":\"n.txt\"}".to_string()));
        assert!(reply.content.is_none());
    }

    #[test]
    fn parses_first_tool_call_with_id() {
        let body = json!({"choices": [{"message": {
            "role": "assistant",
            "content": "",
            "tool_calls": [{"id": "call_1", "type": "function",
                "function": {"name": "git_push", "arguments": "{}"}}]
        }}]});
        let call = parse_response(&body)
            .expect("parse")
            .function_call
            .expect("call");
        assert_eq!(call.name, "git_push");
        assert_eq!(call.id.as_deref(), Some("call_1"));
    }

    #[test]
    fn plain_text_reply_has_no_call() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "done"}}]});
        let reply = parse_response(&body).expect("parse");
        assert_eq!(reply.text(), "done");
        assert!(reply.function_call.is_none());
    }

    #[test]
    fn missing_choices_is_invalid() {
        let err = parse_response(&json!({"error": "x"})).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    /// Verifies a refused connection maps to `Unavailable` so fallback engages.
    #[test]
    fn unreachable_endpoint_is_unavailable() {
        let provider = OpenAiProvider::new(EndpointSettings {
            name: "test".to_string(),
            base_url: "http://127.0.0.1:1/v1".to_string(),
            model: "m".to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            capabilities: ProviderCapabilities::default(),
        })
        .expect("client");
        let err = provider.complete(&request()).unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)), "{err}");
    }
}
