//! Conversation message types shared by the orchestrator, memory log, and
//! provider adapters.
//!
//! Providers hand back many response shapes; the adapter converts them into
//! the single [`Message`] type defined here before anything else sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named arguments passed to a capability.
pub type ArgMap = Map<String, Value>;

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Arguments as received from a provider, before normalization.
///
/// Providers either JSON-encode the argument object into a string or send it
/// as a structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArguments {
    Encoded(String),
    Structured(Value),
}

impl RawArguments {
    /// Normalize into an argument map.
    ///
    /// Returns a description of the problem when the payload is not a JSON
    /// object (after decoding, for the string form).
    pub fn normalize(&self) -> Result<ArgMap, String> {
        match self {
            RawArguments::Encoded(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(ArgMap::new());
                }
                let value: Value = serde_json::from_str(trimmed)
                    .map_err(|err| format!("arguments are not valid JSON: {err}"))?;
                into_object(value)
            }
            RawArguments::Structured(value) => into_object(value.clone()),
        }
    }
}

impl Default for RawArguments {
    fn default() -> Self {
        RawArguments::Structured(Value::Object(ArgMap::new()))
    }
}

impl From<ArgMap> for RawArguments {
    fn from(map: ArgMap) -> Self {
        RawArguments::Structured(Value::Object(map))
    }
}

fn into_object(value: Value) -> Result<ArgMap, String> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!(
            "arguments must be a JSON object, got {}",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A model-issued request to invoke a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: RawArguments,
    /// Provider-assigned call id, when the provider sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<RawArguments>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
            id: None,
        }
    }
}

impl From<Value> for RawArguments {
    fn from(value: Value) -> Self {
        RawArguments::Structured(value)
    }
}

impl From<&str> for RawArguments {
    fn from(text: &str) -> Self {
        RawArguments::Encoded(text.to_string())
    }
}

/// One entry of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            function_call: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Assistant reply that carries a function call and no text.
    pub fn assistant_call(call: FunctionCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            name: None,
            function_call: Some(call),
            tool_call_id: None,
        }
    }

    /// Result of a dispatched call, referencing the call that produced it.
    pub fn tool_result(call: &FunctionCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            name: Some(call.name.clone()),
            function_call: None,
            tool_call_id: call.id.clone(),
        }
    }

    /// Text content, or an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
