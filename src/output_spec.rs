//! Declared output shape of a step and coercion of raw model output into it
//!
//! - `Text`: raw output kept as a JSON string
//! - `Json`: raw output parsed as JSON and, when a schema is declared,
//!   validated against it

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TasklineError};

/// Expected result of a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum OutputSpec {
    /// Plain text (default)
    #[default]
    Text,

    /// Structured JSON, optionally constrained by a JSON Schema
    Json {
        /// Name of the structured type (sent to providers that support it)
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<Value>,
    },
}

impl OutputSpec {
    /// Structured output without schema constraints
    pub fn json(name: impl Into<String>) -> Self {
        OutputSpec::Json {
            name: name.into(),
            schema: None,
        }
    }

    /// Structured output validated against `schema`
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        OutputSpec::Json {
            name: name.into(),
            schema: Some(schema),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputSpec::Text)
    }

    pub fn schema(&self) -> Option<&Value> {
        match self {
            OutputSpec::Json { schema, .. } => schema.as_ref(),
            OutputSpec::Text => None,
        }
    }

    /// Convert raw model output into a value of this shape
    pub fn coerce(&self, raw: &str) -> Result<Value> {
        match self {
            OutputSpec::Text => Ok(Value::String(raw.to_string())),
            OutputSpec::Json { .. } => {
                let value: Value = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
                    TasklineError::InvalidJson {
                        details: e.to_string(),
                    }
                })?;
                self.validate(&value)?;
                Ok(value)
            }
        }
    }

    /// Check an already-built value against this shape
    pub fn validate(&self, value: &Value) -> Result<()> {
        match self {
            OutputSpec::Text => match value {
                Value::String(_) => Ok(()),
                other => Err(TasklineError::SchemaFailed {
                    details: format!("expected text, got {}", value_type(other)),
                }),
            },
            OutputSpec::Json { schema: None, .. } => Ok(()),
            OutputSpec::Json {
                schema: Some(schema),
                name,
            } => validate_schema(value, schema, name),
        }
    }
}

/// Validate a JSON value against a JSON Schema
pub fn validate_schema(value: &Value, schema: &Value, name: &str) -> Result<()> {
    let compiled = jsonschema::validator_for(schema).map_err(|e| TasklineError::SchemaFailed {
        details: format!("Invalid schema '{}': {}", name, e),
    })?;

    let errors: Vec<String> = compiled.iter_errors(value).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TasklineError::SchemaFailed {
            details: errors.join("; "),
        })
    }
}

/// Models often wrap JSON in a markdown fence; strip it
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. `json`), on its own line or not
    let info_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let (info, inner) = body.split_at(info_end);
    let is_info = info.chars().next().map_or(true, |c| c.is_ascii_alphabetic())
        && info.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if is_info && !inner.trim().is_empty() {
        inner.trim()
    } else {
        body.trim()
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
