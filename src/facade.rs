//! LLM Facade
//!
//! The single boundary between steps and model backends. LLM and agent
//! steps call [`LlmFacade`]; the production implementation
//! [`ProviderFacade`] resolves named connections to providers, sends
//! requests and coerces the raw answer into the step's [`OutputSpec`].
//!
//! Uses DashMap for lock-free provider caching, one entry per connection.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{ConnectionStore, DEFAULT_CONNECTION};
use crate::error::{Result, TasklineError};
use crate::message::{InputMessage, LlmConfig};
use crate::output_spec::OutputSpec;
use crate::provider::{
    create_provider, ChatMessage, PromptRequest, PromptResponse, Provider, ResponseFormat,
    ToolDefinition,
};
use crate::tool::LlmTool;

/// Upper bound on model turns in one agent call
pub const MAX_AGENT_TURNS: usize = 16;

/// Access to LLM completions and tool-using agents
///
/// Implementations must be shareable across concurrent task runs.
#[async_trait]
pub trait LlmFacade: Send + Sync {
    /// One completion; the answer is coerced into `output_spec`
    async fn completion(
        &self,
        messages: &[InputMessage],
        output_spec: &OutputSpec,
        llm_config: Option<&LlmConfig>,
        connection_name: Option<&str>,
    ) -> Result<Value>;

    /// Let the model call `tools` until it produces a final answer
    async fn run_agent(
        &self,
        messages: &[InputMessage],
        output_spec: &OutputSpec,
        tools: &[LlmTool],
        llm_config: Option<&LlmConfig>,
        connection_name: Option<&str>,
    ) -> Result<Value>;
}

/// A provider bound to the model of its connection
#[derive(Clone)]
struct Resolved {
    provider: Arc<dyn Provider>,
    model: String,
}

/// Facade backed by configured connections and [`Provider`]s
#[derive(Clone)]
pub struct ProviderFacade {
    store: ConnectionStore,
    default_connection: String,
    default_config: Option<LlmConfig>,
    providers: Arc<DashMap<String, Resolved>>,
}

impl Default for ProviderFacade {
    /// Connections from [`ConnectionStore::from_env`], nothing loaded yet
    fn default() -> Self {
        Self::new(ConnectionStore::from_env())
    }
}

impl ProviderFacade {
    pub fn new(store: ConnectionStore) -> Self {
        Self {
            store,
            default_connection: DEFAULT_CONNECTION.to_string(),
            default_config: None,
            providers: Arc::new(DashMap::new()),
        }
    }

    /// Connection used by steps that name none
    pub fn with_default_connection(mut self, name: impl Into<String>) -> Self {
        self.default_connection = name.into();
        self
    }

    /// Settings used by steps that carry no [`LlmConfig`]
    pub fn with_llm_config(mut self, config: LlmConfig) -> Self {
        self.default_config = Some(config);
        self
    }

    /// Bind a provider to a connection name without reading its file
    pub fn register(
        &self,
        connection_name: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) {
        self.providers.insert(
            connection_name.into(),
            Resolved {
                provider,
                model: model.into(),
            },
        );
    }

    pub fn store(&self) -> &ConnectionStore {
        &self.store
    }

    /// Get or create the provider of a connection (atomic via DashMap entry API)
    fn resolve(&self, connection_name: Option<&str>) -> Result<Resolved> {
        let name = connection_name.unwrap_or(&self.default_connection);

        match self.providers.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let connection = self.store.get(name)?;
                let resolved = Resolved {
                    provider: create_provider(&connection)?,
                    model: connection.model,
                };
                debug!(
                    connection = name,
                    provider = resolved.provider.name(),
                    model = %resolved.model,
                    "Provider created"
                );
                e.insert(resolved.clone());
                Ok(resolved)
            }
        }
    }

    fn request(
        &self,
        resolved: &Resolved,
        messages: Vec<ChatMessage>,
        output_spec: &OutputSpec,
        llm_config: Option<&LlmConfig>,
    ) -> PromptRequest {
        let config = llm_config
            .or(self.default_config.as_ref())
            .cloned()
            .unwrap_or_default();
        PromptRequest::new(resolved.model.clone())
            .with_messages(messages)
            .with_response_format(ResponseFormat::from(output_spec))
            .with_config(config)
    }

    async fn send(&self, resolved: &Resolved, request: PromptRequest) -> Result<PromptResponse> {
        let response = resolved
            .provider
            .execute(request)
            .await
            .map_err(|e| TasklineError::Provider(format!("{:#}", e)))?;

        if !response.success {
            warn!(
                provider = resolved.provider.name(),
                error = %response.content,
                "Provider call failed"
            );
            return Err(TasklineError::Provider(response.content));
        }

        debug!(
            provider = resolved.provider.name(),
            tokens = response.usage.total_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("-"),
            "Provider call finished"
        );
        Ok(response)
    }
}

#[async_trait]
impl LlmFacade for ProviderFacade {
    #[instrument(skip_all, fields(connection = ?connection_name))]
    async fn completion(
        &self,
        messages: &[InputMessage],
        output_spec: &OutputSpec,
        llm_config: Option<&LlmConfig>,
        connection_name: Option<&str>,
    ) -> Result<Value> {
        let resolved = self.resolve(connection_name)?;
        let request = self.request(
            &resolved,
            messages.iter().map(ChatMessage::from).collect(),
            output_spec,
            llm_config,
        );

        let response = self.send(&resolved, request).await?;
        output_spec.coerce(&response.content)
    }

    #[instrument(skip_all, fields(connection = ?connection_name, tools = tools.len()))]
    async fn run_agent(
        &self,
        messages: &[InputMessage],
        output_spec: &OutputSpec,
        tools: &[LlmTool],
        llm_config: Option<&LlmConfig>,
        connection_name: Option<&str>,
    ) -> Result<Value> {
        let resolved = self.resolve(connection_name)?;
        if !tools.is_empty() && !resolved.provider.supports_tools() {
            return Err(TasklineError::Provider(format!(
                "provider '{}' does not support tool calls",
                resolved.provider.name()
            )));
        }

        let definitions: Vec<ToolDefinition> = tools.iter().map(ToolDefinition::from).collect();
        let mut conversation: Vec<ChatMessage> = messages.iter().map(ChatMessage::from).collect();

        for turn in 1..=MAX_AGENT_TURNS {
            let request = self
                .request(&resolved, conversation.clone(), output_spec, llm_config)
                .with_tools(definitions.clone());
            let response = self.send(&resolved, request).await?;

            if response.tool_calls.is_empty() {
                debug!(turn, "Agent produced final answer");
                return output_spec.coerce(&response.content);
            }

            debug!(turn, calls = response.tool_calls.len(), "Agent requested tool calls");
            conversation.push(ChatMessage::assistant_tool_calls(
                response.content,
                response.tool_calls.clone(),
            ));

            for call in response.tool_calls {
                let tool = tools
                    .iter()
                    .find(|t| t.name() == call.name)
                    .ok_or_else(|| TasklineError::UnknownTool {
                        name: call.name.clone(),
                    })?;
                let result = tool.call(call.arguments)?;
                conversation.push(ChatMessage::tool_result(call.id, tool_output_text(&result)));
            }
        }

        Err(TasklineError::AgentTurnLimit {
            turns: MAX_AGENT_TURNS,
        })
    }
}

/// Strings go back to the model verbatim, everything else as JSON
fn tool_output_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
