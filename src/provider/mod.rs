//! # Provider Abstraction Layer
//!
//! Trait and implementations for LLM backends driven by the
//! [`ProviderFacade`](crate::facade::ProviderFacade).
//!
//! - [`Provider`] - Core trait for executing one chat request
//! - [`OpenAIProvider`] - Any OpenAI-compatible chat-completions endpoint
//!   (OpenAI, Mistral, Ollama, vLLM, ...) selected by the connection's `base_url`
//! - [`MockProvider`] - Test provider with scripted responses
//!
//! ## Creating Providers
//!
//! Use [`create_provider`] with a [`Connection`]:
//!
//! ```rust
//! use taskline::config::Connection;
//! use taskline::provider::create_provider;
//!
//! let conn = Connection::mock("mock-model");
//! let provider = create_provider(&conn).unwrap();
//! assert_eq!(provider.name(), "mock");
//! ```

mod mock;
mod openai;

pub use mock::MockProvider;
pub use openai::OpenAIProvider;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::config::Connection;
use crate::error::TasklineError;
use crate::message::{InputMessage, LlmConfig, MessageRole};
use crate::output_spec::OutputSpec;
use crate::tool::LlmTool;

/// Average characters per token for mixed content (prose + code)
const CHARS_PER_TOKEN_MIXED: f32 = 3.0;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Capabilities that a provider may support
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Supports tool/function calling
    pub tool_use: bool,
    /// Supports JSON mode output
    pub json_mode: bool,
}

impl Capabilities {
    /// OpenAI-compatible endpoint capabilities
    pub fn openai() -> Self {
        Self {
            tool_use: true,
            json_mode: true,
        }
    }

    /// Mock provider capabilities (everything enabled)
    pub fn mock() -> Self {
        Self {
            tool_use: true,
            json_mode: true,
        }
    }
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Core trait that all LLM providers must implement
///
/// The facade builds a [`PromptRequest`] and hands it over; the provider
/// formats it for its API and returns a [`PromptResponse`]. Tool execution
/// loops are driven by the facade, not by the provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g., "openai", "mock")
    fn name(&self) -> &str;

    /// Returns the provider's capabilities
    fn capabilities(&self) -> Capabilities;

    /// Execute one request
    async fn execute(&self, request: PromptRequest) -> Result<PromptResponse>;

    /// Check if this provider supports tool execution
    fn supports_tools(&self) -> bool {
        self.capabilities().tool_use
    }

    /// Check if this provider is available (e.g., API key set)
    fn is_available(&self) -> bool {
        true
    }
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

/// Role of a message in a provider conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    /// Result of a tool call
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

/// One message of a provider conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Tool calls requested by an assistant message
    pub tool_calls: Vec<ToolCall>,
    /// Call answered by a tool message
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    /// Tool result answering `call_id`
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new(ChatRole::Tool, content)
        }
    }
}

impl From<&InputMessage> for ChatMessage {
    fn from(message: &InputMessage) -> Self {
        let role = match message.role {
            MessageRole::System => ChatRole::System,
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        };
        ChatMessage::new(role, message.content.clone())
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Tool description sent to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&LlmTool> for ToolDefinition {
    fn from(tool: &LlmTool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters().clone(),
        }
    }
}

/// Requested output format
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Any JSON object
    JsonObject,
    /// JSON constrained by a named schema
    JsonSchema { name: String, schema: Value },
}

impl From<&OutputSpec> for ResponseFormat {
    fn from(spec: &OutputSpec) -> Self {
        match spec {
            OutputSpec::Text => ResponseFormat::Text,
            OutputSpec::Json { schema: None, .. } => ResponseFormat::JsonObject,
            OutputSpec::Json {
                name,
                schema: Some(schema),
            } => ResponseFormat::JsonSchema {
                name: name.clone(),
                schema: schema.clone(),
            },
        }
    }
}

/// Request to execute one chat turn
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// Model to use (e.g., "gpt-4o")
    pub model: String,

    /// Conversation so far
    pub messages: Vec<ChatMessage>,

    /// Tools the model is allowed to call
    pub tools: Vec<ToolDefinition>,

    /// Requested output format
    pub response_format: ResponseFormat,

    /// Generation settings
    pub config: LlmConfig,
}

impl PromptRequest {
    /// Create a new request with minimal required fields
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![],
            tools: vec![],
            response_format: ResponseFormat::Text,
            config: LlmConfig::default(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Total characters of all message contents (for token estimates)
    pub fn prompt_len(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// Response from a prompt execution
#[derive(Debug, Clone)]
pub struct PromptResponse {
    /// The generated content (empty when the model only called tools)
    pub content: String,

    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,

    /// Whether the execution was successful
    pub success: bool,

    /// Token usage statistics
    pub usage: TokenUsage,

    /// Stop reason (e.g., "stop", "length", "tool_calls")
    pub stop_reason: Option<String>,
}

impl PromptResponse {
    /// Create a successful response
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            success: true,
            usage: TokenUsage::default(),
            stop_reason: Some("stop".to_string()),
        }
    }

    /// Create a response requesting tool calls
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls,
            success: true,
            usage: TokenUsage::default(),
            stop_reason: Some("tool_calls".to_string()),
        }
    }

    /// Create a failed response
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            content: error.into(),
            tool_calls: vec![],
            success: false,
            usage: TokenUsage::default(),
            stop_reason: Some("error".to_string()),
        }
    }

    /// Set token usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens in the prompt (input)
    pub prompt_tokens: u32,

    /// Tokens in the response (output)
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    /// Estimate usage for mixed content (when actual counts aren't available)
    pub fn estimate(prompt_len: usize, response_len: usize) -> Self {
        let prompt_tokens = (prompt_len as f32 / CHARS_PER_TOKEN_MIXED).ceil() as u32;
        let completion_tokens = (response_len as f32 / CHARS_PER_TOKEN_MIXED).ceil() as u32;
        Self::new(prompt_tokens, completion_tokens)
    }
}

// ============================================================================
// PROVIDER FACTORY
// ============================================================================

/// Create a provider for a connection
///
/// | `provider` | Description |
/// |------------|-------------|
/// | `openai` | OpenAI-compatible chat completions at `base_url` |
/// | `mock` | Testing, answers "Mock response" |
pub fn create_provider(connection: &Connection) -> Result<Arc<dyn Provider>, TasklineError> {
    match connection.provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAIProvider::from_connection(connection))),
        "mock" => Ok(Arc::new(MockProvider::new())),
        _ => Err(TasklineError::UnknownProvider {
            name: connection.provider.clone(),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
