//! LLM and agent steps
//!
//! Both build a message list from the step input, then hand it to the
//! context's facade together with the declared output shape. The facade's
//! answer becomes the step output unchanged.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::single_record;
use crate::context::TaskContext;
use crate::error::{Result, TasklineError};
use crate::message::{InputMessage, LlmConfig};
use crate::meta::{InvocationKind, InvocationSpecMeta};
use crate::output_spec::OutputSpec;
use crate::record::{InvocationEffect, InvocationRecords};
use crate::tool::LlmTool;

/// Builds the messages of one call from the step input
pub type MessageBuilder =
    Arc<dyn Fn(&Value, &TaskContext) -> anyhow::Result<Vec<InputMessage>> + Send + Sync>;

/// Render a step input as prompt text
///
/// Strings are used verbatim, other values as compact JSON.
pub fn input_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// System prompt, then the task history, then the input as user message
fn prompt_messages(system_prompt: String) -> MessageBuilder {
    Arc::new(move |input: &Value, ctx: &TaskContext| {
        let mut messages = vec![InputMessage::system(system_prompt.clone())];
        if let Some(history) = ctx.initial_history() {
            messages.extend(history.items.iter().cloned());
        }
        messages.push(InputMessage::user(input_text(input)));
        Ok(messages)
    })
}

fn builder<F>(create_messages: F) -> MessageBuilder
where
    F: Fn(&Value, &TaskContext) -> anyhow::Result<Vec<InputMessage>> + Send + Sync + 'static,
{
    Arc::new(create_messages)
}

/// A step answered by one LLM completion
#[derive(Clone)]
pub struct LlmStep {
    meta: InvocationSpecMeta,
    output_spec: OutputSpec,
    create_messages: MessageBuilder,
    llm_config: Option<LlmConfig>,
    connection_name: Option<String>,
}

impl LlmStep {
    pub fn new<F>(meta: InvocationSpecMeta, output_spec: OutputSpec, create_messages: F) -> Self
    where
        F: Fn(&Value, &TaskContext) -> anyhow::Result<Vec<InputMessage>> + Send + Sync + 'static,
    {
        Self {
            meta,
            output_spec,
            create_messages: builder(create_messages),
            llm_config: None,
            connection_name: None,
        }
    }

    /// Step that sends `system_prompt`, the task history and the input
    pub fn prompted(
        meta: InvocationSpecMeta,
        output_spec: OutputSpec,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            meta,
            output_spec,
            create_messages: prompt_messages(system_prompt.into()),
            llm_config: None,
            connection_name: None,
        }
    }

    pub fn with_llm_config(mut self, config: LlmConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    /// Use a named connection instead of the facade default
    pub fn with_connection(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    pub fn meta(&self) -> &InvocationSpecMeta {
        &self.meta
    }

    pub fn output_spec(&self) -> &OutputSpec {
        &self.output_spec
    }

    pub fn llm_config(&self) -> Option<&LlmConfig> {
        self.llm_config.as_ref()
    }

    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    pub async fn invoke(&self, input: Value, ctx: &TaskContext) -> Result<InvocationRecords> {
        let started_at = Utc::now();
        let messages = (self.create_messages)(&input, ctx).map_err(TasklineError::from_step)?;

        let output = ctx
            .facade()
            .completion(
                &messages,
                &self.output_spec,
                self.llm_config.as_ref(),
                self.connection_name.as_deref(),
            )
            .await?;

        Ok(single_record(
            &self.meta,
            InvocationKind::Llm,
            started_at,
            input,
            InvocationEffect::new(output),
        ))
    }
}

impl fmt::Debug for LlmStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmStep")
            .field("meta", &self.meta)
            .field("output_spec", &self.output_spec)
            .field("llm_config", &self.llm_config)
            .field("connection_name", &self.connection_name)
            .finish_non_exhaustive()
    }
}

/// A step answered by an agent that may call tools
#[derive(Clone)]
pub struct AgentStep {
    meta: InvocationSpecMeta,
    output_spec: OutputSpec,
    create_messages: MessageBuilder,
    tools: Vec<LlmTool>,
    llm_config: Option<LlmConfig>,
    connection_name: Option<String>,
}

impl AgentStep {
    pub fn new<F>(
        meta: InvocationSpecMeta,
        output_spec: OutputSpec,
        tools: Vec<LlmTool>,
        create_messages: F,
    ) -> Self
    where
        F: Fn(&Value, &TaskContext) -> anyhow::Result<Vec<InputMessage>> + Send + Sync + 'static,
    {
        Self {
            meta,
            output_spec,
            create_messages: builder(create_messages),
            tools,
            llm_config: None,
            connection_name: None,
        }
    }

    /// Agent that sends `system_prompt`, the task history and the input
    pub fn prompted(
        meta: InvocationSpecMeta,
        output_spec: OutputSpec,
        tools: Vec<LlmTool>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            meta,
            output_spec,
            create_messages: prompt_messages(system_prompt.into()),
            tools,
            llm_config: None,
            connection_name: None,
        }
    }

    pub fn with_llm_config(mut self, config: LlmConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    pub fn with_connection(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    pub fn meta(&self) -> &InvocationSpecMeta {
        &self.meta
    }

    pub fn output_spec(&self) -> &OutputSpec {
        &self.output_spec
    }

    pub fn tools(&self) -> &[LlmTool] {
        &self.tools
    }

    pub async fn invoke(&self, input: Value, ctx: &TaskContext) -> Result<InvocationRecords> {
        let started_at = Utc::now();
        let messages = (self.create_messages)(&input, ctx).map_err(TasklineError::from_step)?;

        let output = ctx
            .facade()
            .run_agent(
                &messages,
                &self.output_spec,
                &self.tools,
                self.llm_config.as_ref(),
                self.connection_name.as_deref(),
            )
            .await?;

        Ok(single_record(
            &self.meta,
            InvocationKind::Agent,
            started_at,
            input,
            InvocationEffect::new(output),
        ))
    }
}

impl fmt::Debug for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStep")
            .field("meta", &self.meta)
            .field("output_spec", &self.output_spec)
            .field("tools", &self.tools)
            .field("llm_config", &self.llm_config)
            .field("connection_name", &self.connection_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionStore;
    use crate::facade::ProviderFacade;
    use crate::message::MessageHistory;
    use crate::meta::TaskMeta;
    use crate::provider::{ChatRole, MockProvider, ToolCall};
    use crate::record::TaskArgument;
    use serde_json::json;

    fn context(mock: &MockProvider, history: Option<MessageHistory>) -> TaskContext {
        let facade = ProviderFacade::new(ConnectionStore::new("unused"));
        facade.register("default", Arc::new(mock.clone()), "mock-model");
        TaskContext::new(
            TaskMeta::new("llm-test").unwrap(),
            TaskArgument::new(json!("start"), history),
            Arc::new(facade),
        )
    }

    fn meta(name: &str) -> InvocationSpecMeta {
        InvocationSpecMeta::new(name, "test step").unwrap()
    }

    #[test]
    fn input_text_formats_values() {
        assert_eq!(input_text(&json!("plain")), "plain");
        assert_eq!(input_text(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }

    #[tokio::test]
    async fn llm_step_records_facade_answer() {
        let mock = MockProvider::with_responses(vec![r#"{"name": "Ada", "age": 36}"#.to_string()]);
        let ctx = context(&mock, None);
        let step = LlmStep::new(meta("extract"), OutputSpec::json("Person"), |input, _ctx| {
            Ok(vec![
                InputMessage::system("Extract a person as JSON"),
                InputMessage::user(input_text(input)),
            ])
        });

        let records = step.invoke(json!("Ada, 36"), &ctx).await.unwrap();
        let record = &records.entries[0];
        assert_eq!(record.meta.kind, InvocationKind::Llm);
        assert_eq!(record.input, json!("Ada, 36"));
        assert_eq!(record.output, json!({"name": "Ada", "age": 36}));
        assert!(records.repository_updates.is_empty());

        let request = mock.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "Ada, 36");
    }

    #[tokio::test]
    async fn prompted_step_includes_history() {
        let mock = MockProvider::new();
        let history =
            MessageHistory::new(vec![InputMessage::user("hi"), InputMessage::assistant("hello")]);
        let ctx = context(&mock, Some(history));
        let step = LlmStep::prompted(meta("chat"), OutputSpec::Text, "Be brief");

        step.invoke(json!("what now?"), &ctx).await.unwrap();

        let request = mock.last_request().unwrap();
        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(request.messages[3].content, "what now?");
    }

    #[tokio::test]
    async fn message_builder_error_propagates() {
        let mock = MockProvider::new();
        let ctx = context(&mock, None);
        let step = LlmStep::new(meta("broken"), OutputSpec::Text, |_input, _ctx| {
            Err(anyhow::anyhow!("no template"))
        });

        let err = step.invoke(json!(null), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "no template");
        assert!(mock.get_requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_connection_fails() {
        let mock = MockProvider::new();
        let ctx = context(&mock, None);
        let step =
            LlmStep::prompted(meta("elsewhere"), OutputSpec::Text, "x").with_connection("missing");

        let err = step.invoke(json!("q"), &ctx).await.unwrap_err();
        assert!(matches!(err, TasklineError::ConnectionNotFound { .. }));
    }

    #[tokio::test]
    async fn agent_step_uses_tools() {
        let mock = MockProvider::new();
        mock.queue_tool_calls(vec![ToolCall {
            id: "c1".to_string(),
            name: "lookup".to_string(),
            arguments: json!({"key": "capital"}),
        }]);
        mock.queue_response("Paris");
        let ctx = context(&mock, None);

        let tool = LlmTool::new(
            "lookup",
            "Look up a fact",
            json!({"type": "object", "properties": {"key": {"type": "string"}}}),
            |args| Ok(json!(format!("fact for {}", args["key"].as_str().unwrap_or("?")))),
        )
        .unwrap();
        let step = AgentStep::prompted(
            meta("agent"),
            OutputSpec::Text,
            vec![tool],
            "Answer with one word",
        );

        let records = step.invoke(json!("capital of France?"), &ctx).await.unwrap();
        assert_eq!(records.entries[0].meta.kind, InvocationKind::Agent);
        assert_eq!(records.output(), Some(&json!("Paris")));
        assert_eq!(mock.get_requests()[1].messages.last().unwrap().content, "fact for capital");
    }
}
