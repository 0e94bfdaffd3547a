//! # Completion Gateway
//!
//! Contract for the external text-generation service. Every agent, the step
//! executor and the orchestrator talk to the model through
//! [`CompletionGateway`]; the concrete HTTP client lives in [`http`].
//!
//! Callers must never assume JSON-shaped output, even when they ask for it.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ModelConfig;

pub use http::{HttpGateway, HttpGatewayFactory};

/// Role of a message in the conversation history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments; falls back to a JSON string when the model emits invalid JSON
    pub arguments: serde_json::Value,
}

/// A tool the model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// One entry of the message history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant turn that only carries tool invocations
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// Result of executing a tool call, fed back to the model
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// A single request to the gateway
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            max_tokens: 2048,
            temperature: 0.7,
            tools: Vec::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model sent back: text, tool calls, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl CompletionReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Gateway failure, classified by whether retrying later could help
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum GatewayError {
    /// Rate limit, network hiccup, 5xx, malformed envelope
    #[error("transient gateway failure: {0}")]
    Transient(String),
    /// Missing credentials or rejected authentication; the run cannot continue
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// The text-generation service
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Send one request and return the raw reply
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, GatewayError>;

    /// Convenience wrapper returning only the text content
    async fn chat(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let reply = self.complete(request).await?;
        Ok(reply.content.unwrap_or_default())
    }
}

/// Builds a gateway for a resolved model configuration
pub trait GatewayFactory: Send + Sync {
    fn create(&self, config: &ModelConfig) -> Arc<dyn CompletionGateway>;
}

/// Hands out the same gateway regardless of model configuration
#[derive(Clone)]
pub struct SharedGateway(pub Arc<dyn CompletionGateway>);

impl GatewayFactory for SharedGateway {
    fn create(&self, _config: &ModelConfig) -> Arc<dyn CompletionGateway> {
        Arc::clone(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_classification() {
        assert!(GatewayError::Unavailable("no key".into()).is_permanent());
        assert!(!GatewayError::Transient("429".into()).is_permanent());
    }

    #[test]
    fn test_tool_result_message_carries_call_id() {
        let msg = ChatMessage::tool_result("call_1", "{\"ok\":true}");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.text(), "{\"ok\":true}");
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ChatMessage::user("hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }
}
