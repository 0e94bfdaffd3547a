//! OpenAI-compatible chat completions client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    ChatMessage, CompletionGateway, CompletionReply, CompletionRequest, GatewayError,
    GatewayFactory, Role, ToolCall,
};
use crate::models::ModelConfig;

/// Gateway backed by a provider's chat completions endpoint
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: ModelConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

fn function_type() -> String {
    "function".to_string()
}

impl HttpGateway {
    /// Build a client for the given model; the API key is read from the environment.
    ///
    /// A missing key is not an error here: every request then fails with
    /// [`GatewayError::Unavailable`], which agents treat as fatal.
    pub fn new(config: ModelConfig) -> Self {
        let api_key = config.api_key();
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: ModelConfig, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            api_key,
        }
    }

    fn wire_message(message: &ChatMessage) -> WireMessage {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        WireMessage {
            role: role.to_string(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    call_type: function_type(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: match &call.arguments {
                            Value::String(raw) => raw.clone(),
                            other => other.to_string(),
                        },
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    fn build_body(&self, request: &CompletionRequest) -> WireRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system".to_string(),
            content: Some(request.system_prompt.clone()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        });
        messages.extend(request.messages.iter().map(Self::wire_message));

        WireRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect(),
        }
    }
}

/// Map an HTTP status to the gateway error taxonomy
fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let message = format!("{}: {}", status, body.chars().take(300).collect::<String>());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unavailable(message),
        _ => GatewayError::Transient(message),
    }
}

#[async_trait]
impl CompletionGateway for HttpGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::Unavailable(format!(
                "{} is not set",
                self.config.provider.api_key_env()
            ))
        })?;

        let body = self.build_body(&request);
        let response = self
            .client
            .post(self.config.endpoint())
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("invalid response envelope: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Transient("response contained no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
            })
            .collect();

        Ok(CompletionReply {
            content: choice.message.content,
            tool_calls,
        })
    }
}

/// Creates an [`HttpGateway`] per resolved model configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpGatewayFactory;

impl GatewayFactory for HttpGatewayFactory {
    fn create(&self, config: &ModelConfig) -> Arc<dyn CompletionGateway> {
        Arc::new(HttpGateway::new(config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ToolDefinition;

    #[tokio::test]
    async fn test_missing_api_key_is_permanent() {
        let gateway = HttpGateway::with_api_key(ModelConfig::default(), None);
        let err = gateway
            .complete(CompletionRequest::new("system", vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_body_puts_system_prompt_first_and_encodes_tools() {
        let gateway = HttpGateway::with_api_key(ModelConfig::new("m"), Some("k".into()));
        let request = CompletionRequest::new(
            "be terse",
            vec![
                ChatMessage::user("make a sheet"),
                ChatMessage::assistant_tool_calls(vec![ToolCall {
                    id: "call_1".into(),
                    name: "generate_spreadsheet".into(),
                    arguments: json!({"sheets": []}),
                }]),
                ChatMessage::tool_result("call_1", "done"),
            ],
        )
        .with_tools(vec![ToolDefinition {
            name: "generate_spreadsheet".into(),
            description: "Create a spreadsheet".into(),
            parameters: json!({"type": "object"}),
        }]);

        let body = serde_json::to_value(gateway.build_body(&request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
        assert_eq!(
            body["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"sheets\":[]}"
        );
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "generate_spreadsheet");
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::UNAUTHORIZED, "bad key").is_permanent());
        assert!(!classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_permanent());
        assert!(!classify_status(StatusCode::BAD_GATEWAY, "").is_permanent());
    }
}
