//! OpenAI-compatible provider
//!
//! Executes prompts via the Chat Completions API at
//! `{base_url}/chat/completions`, so any compatible server works.

use super::{
    Capabilities, ChatMessage, PromptRequest, PromptResponse, Provider, ResponseFormat, TokenUsage,
    ToolCall,
};
use crate::config::Connection;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default public endpoint
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for OpenAI-compatible chat completion endpoints
pub struct OpenAIProvider {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL without trailing slash
    base_url: String,
    /// API key
    api_key: String,
    /// Model used when the request leaves it empty
    model: String,
}

impl OpenAIProvider {
    /// Create with a specific API key against the public endpoint
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
        }
    }

    /// Create from a validated connection
    pub fn from_connection(connection: &Connection) -> Self {
        Self::with_api_key(connection.api_key.clone())
            .with_base_url(connection.base_url.clone())
            .with_model(connection.model.clone())
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at another compatible server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_payload(&self, request: &PromptRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.config.max_tokens,
            temperature: request.config.temperature,
            frequency_penalty: request.config.frequency_penalty,
            presence_penalty: request.config.presence_penalty,
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
            response_format: match &request.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(json!({"type": "json_object"})),
                ResponseFormat::JsonSchema { name, schema } => Some(json!({
                    "type": "json_schema",
                    "json_schema": {"name": name, "schema": schema}
                })),
            },
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::openai()
    }

    async fn execute(&self, request: PromptRequest) -> Result<PromptResponse> {
        let payload = self.build_payload(&request);

        tracing::debug!(
            provider = "openai",
            model = %payload.model,
            messages_count = payload.messages.len(),
            tools_count = payload.tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to chat completions endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = "openai",
                status = %status,
                error = %error_text,
                "Chat completion API error"
            );
            return Ok(PromptResponse::failure(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let Some(choice) = api_response.choices.into_iter().next() else {
            return Ok(PromptResponse::failure("response contained no choices"));
        };

        let content = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ToolCall::try_from)
            .collect::<Result<Vec<_>>>()?;

        let usage = match api_response.usage {
            Some(u) => TokenUsage::new(u.prompt_tokens, u.completion_tokens),
            None => TokenUsage::estimate(request.prompt_len(), content.len()),
        };

        tracing::debug!(
            provider = "openai",
            tokens = usage.total_tokens,
            tool_calls = tool_calls.len(),
            "Chat completion response received"
        );

        Ok(PromptResponse {
            content,
            tool_calls,
            success: true,
            usage,
            stop_reason: choice.finish_reason,
        })
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    function: WireFunction,
}

/// Arguments travel as a JSON-encoded string
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl TryFrom<WireToolCall> for ToolCall {
    type Error = anyhow::Error;

    fn try_from(call: WireToolCall) -> Result<Self> {
        let arguments = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).with_context(|| {
                format!("Invalid arguments for tool call '{}'", call.function.name)
            })?
        };
        Ok(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LlmConfig;
    use crate::provider::{ChatRole, ToolDefinition};

    #[test]
    fn test_openai_provider_name() {
        let provider = OpenAIProvider::with_api_key("test-key");
        assert_eq!(provider.name(), "openai");
        assert!(provider.capabilities().json_mode);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider =
            OpenAIProvider::with_api_key("k").with_base_url("http://localhost:11434/v1/");
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_payload_uses_provider_model_when_request_is_empty() {
        let provider = OpenAIProvider::with_api_key("k").with_model("gpt-4-turbo");
        let payload = provider.build_payload(&PromptRequest::new(""));
        assert_eq!(payload.model, "gpt-4-turbo");
    }

    #[test]
    fn test_payload_serialization() {
        let provider = OpenAIProvider::with_api_key("k");
        let request = PromptRequest::new("gpt-4o")
            .with_messages(vec![
                ChatMessage::new(ChatRole::System, "be brief"),
                ChatMessage::new(ChatRole::User, "hi"),
            ])
            .with_response_format(ResponseFormat::JsonObject)
            .with_config(LlmConfig::default().with_temperature(0.0));

        let value = serde_json::to_value(provider.build_payload(&request)).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["temperature"], 0.0);
        assert!(value.get("tools").is_none());
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_payload_tools_and_tool_messages() {
        let provider = OpenAIProvider::with_api_key("k");
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments: json!({"a": 1}),
        };
        let request = PromptRequest::new("gpt-4o")
            .with_messages(vec![
                ChatMessage::assistant_tool_calls("", vec![call]),
                ChatMessage::tool_result("call_1", "1"),
            ])
            .with_tools(vec![ToolDefinition {
                name: "add".to_string(),
                description: "Add".to_string(),
                parameters: json!({"type": "object"}),
            }]);

        let value = serde_json::to_value(provider.build_payload(&request)).unwrap();
        assert_eq!(value["tools"][0]["function"]["name"], "add");
        assert_eq!(value["messages"][0]["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
        assert_eq!(value["messages"][1]["role"], "tool");
        assert_eq!(value["messages"][1]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_wire_tool_call_arguments_are_parsed() {
        let wire = WireToolCall {
            id: "c".to_string(),
            kind: "function".to_string(),
            function: WireFunction {
                name: "add".to_string(),
                arguments: r#"{"a": 2}"#.to_string(),
            },
        };
        let call = ToolCall::try_from(wire).unwrap();
        assert_eq!(call.arguments, json!({"a": 2}));
    }

    #[test]
    fn test_is_available() {
        assert!(OpenAIProvider::with_api_key("test-key").is_available());
        assert!(!OpenAIProvider::with_api_key("").is_available());
    }
}
