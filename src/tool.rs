//! Callable tools an agent step may invoke autonomously

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, TasklineError};

/// Tool implementation: JSON arguments in, JSON result out
pub type ToolHandler = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// A tool offered to an agent
#[derive(Clone)]
pub struct LlmTool {
    name: String,
    description: String,
    /// JSON Schema of the arguments object
    parameters: Value,
    handler: ToolHandler,
}

impl LlmTool {
    /// Create a tool.
    ///
    /// The name must be non-empty and `parameters` must be a JSON Schema
    /// describing an object, since providers pass arguments as one JSON object.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TasklineError::InvalidTool {
                name,
                details: "name must not be empty".to_string(),
            });
        }
        let is_object_schema = parameters
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t == "object");
        if !is_object_schema {
            return Err(TasklineError::InvalidTool {
                name,
                details: "parameters must be a JSON Schema with \"type\": \"object\"".to_string(),
            });
        }

        Ok(Self {
            name,
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Run the tool
    pub fn call(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).map_err(|source| TasklineError::Tool {
            name: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for LlmTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_tool() -> LlmTool {
        LlmTool::new(
            "add",
            "Add two integers",
            json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                "required": ["a", "b"]
            }),
            |args| {
                let a = args["a"].as_i64().ok_or_else(|| anyhow::anyhow!("a missing"))?;
                let b = args["b"].as_i64().ok_or_else(|| anyhow::anyhow!("b missing"))?;
                Ok(json!(a + b))
            },
        )
        .unwrap()
    }

    #[test]
    fn call_runs_handler() {
        let tool = add_tool();
        assert_eq!(tool.call(json!({"a": 2, "b": 3})).unwrap(), json!(5));
        assert_eq!(tool.name(), "add");
    }

    #[test]
    fn handler_errors_name_the_tool() {
        let err = add_tool().call(json!({"a": 2})).unwrap_err();
        assert!(matches!(err, TasklineError::Tool { ref name, .. } if name == "add"));
        assert!(err.to_string().contains("b missing"));
    }

    #[test]
    fn rejects_non_object_parameters() {
        let result = LlmTool::new("bad", "", json!({"type": "string"}), |v| Ok(v));
        assert!(matches!(result, Err(TasklineError::InvalidTool { .. })));
    }

    #[test]
    fn rejects_empty_name() {
        let result = LlmTool::new(" ", "", json!({"type": "object"}), |v| Ok(v));
        assert!(result.is_err());
    }
}
