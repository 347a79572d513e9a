//! Chat-completion providers.
//!
//! The rest of the crate speaks [`Message`] and [`ChatRequest`]; only
//! [`openai`] knows the wire shape of an endpoint. [`FallbackProvider`]
//! pairs two endpoints and retries a failed request once on the second.

pub mod fallback;
pub mod openai;

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::message::Message;
use crate::io::config::{AgentConfig, ProviderKind};

pub use fallback::FallbackProvider;
pub use openai::{EndpointSettings, OpenAiProvider};

/// Marker that opens the hidden system message carrying prior memory.
pub const MEMORY_MARKER: &str = "<MEMORY>\n";

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// What request shapes an endpoint accepts. Decided from config, never detected at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Endpoint accepts prior conversation in a dedicated `memory` parameter.
    pub supports_inline_memory: bool,
}

/// One model turn: the per-turn messages, the advertised functions, and
/// the prior session memory.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub functions: Vec<FunctionSchema>,
    pub memory: Vec<Message>,
}

impl ChatRequest {
    /// Messages to send to an endpoint with `capabilities`, and the memory to
    /// pass inline (if any).
    ///
    /// Without inline support the memory becomes a leading system message
    /// `"<MEMORY>\n" + json(memory)`.
    pub fn shaped_for(&self, capabilities: ProviderCapabilities) -> (Vec<Message>, Option<&[Message]>) {
        if capabilities.supports_inline_memory {
            return (self.messages.clone(), Some(&self.memory));
        }
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(hidden_memory_message(&self.memory));
        messages.extend(self.messages.iter().cloned());
        (messages, None)
    }
}

/// System message carrying `memory` as JSON behind [`MEMORY_MARKER`].
pub fn hidden_memory_message(memory: &[Message]) -> Message {
    let encoded = serde_json::to_string(memory).unwrap_or_else(|_| "[]".to_string());
    Message::system(format!("{MEMORY_MARKER}{encoded}"))
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Endpoint unreachable, timed out, or failing server-side.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// Endpoint refused the request shape (4xx).
    #[error("provider rejected request ({status}): {body}")]
    RequestRejected { status: u16, body: String },
    /// Endpoint answered with something that is not a chat completion.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a second endpoint may succeed where this one failed.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::RequestRejected { .. }
        )
    }
}

/// A chat-completion endpoint.
pub trait ChatProvider {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Send one request and return the assistant reply.
    fn complete(&self, request: &ChatRequest) -> Result<Message, ProviderError>;
}

/// Build the configured primary/secondary pair.
pub fn build_provider(config: &AgentConfig) -> Result<Box<dyn ChatProvider>> {
    let hosted = OpenAiProvider::new(EndpointSettings {
        name: "openai".to_string(),
        base_url: config.openai_base_url.clone(),
        model: config.model.clone(),
        api_key: config.api_key.clone(),
        connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        capabilities: ProviderCapabilities {
            supports_inline_memory: config.openai_supports_inline_memory,
        },
    })?;
    let alternate = OpenAiProvider::new(EndpointSettings {
        name: "alternate".to_string(),
        base_url: config.alternate_base_url.clone(),
        model: config.model.clone(),
        api_key: None,
        connect_timeout: Duration::from_secs(config.alternate_timeout_secs),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        capabilities: ProviderCapabilities {
            supports_inline_memory: config.alternate_supports_inline_memory,
        },
    })?;
    debug!(primary = ?config.provider, model = %config.model, "provider pair built");
    let pair = match config.provider {
        ProviderKind::Openai => FallbackProvider::new(Box::new(hosted), Box::new(alternate)),
        ProviderKind::Alternate => FallbackProvider::new(Box::new(alternate), Box::new(hosted)),
    };
    Ok(Box::new(pair))
}
