//! Error types with fix suggestions
//!
//! Every failure inside a run aborts the whole run and reaches the caller of
//! [`TaskSpec::run`](crate::task::TaskSpec::run) as one of these variants.
//! Errors raised by step bodies are carried through [`TasklineError::Step`]
//! untouched, so the caller can downcast to the original error type.

use std::path::PathBuf;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T> = std::result::Result<T, TasklineError>;

#[derive(Error, Debug)]
pub enum TasklineError {
    // ─────────────────────────────────────────────────────────────
    // Configuration / selection errors (TL-001 to TL-019)
    // ─────────────────────────────────────────────────────────────
    #[error("TL-001: Metadata field '{field}' must not be empty")]
    InvalidMeta { field: &'static str },

    #[error("TL-002: Tool '{name}' is invalid: {details}")]
    InvalidTool { name: String, details: String },

    #[error("TL-003: Selector '{selector}' returned {selected}, which is not an invocable step")]
    NotInvocable { selector: String, selected: String },

    #[error("TL-004: Selected step '{step}' has more than one candidate named '{name}'")]
    DuplicateCandidate { step: String, name: String },

    #[error("TL-010: Connection '{name}' is not configured (expected {})", path.display())]
    ConnectionNotFound { name: String, path: PathBuf },

    #[error("TL-011: Connection '{name}' is not valid ({}): {details}", path.display())]
    IllegalConfiguration {
        name: String,
        path: PathBuf,
        details: String,
    },

    #[error("TL-012: Invalid connection name '{name}'")]
    InvalidConnectionName { name: String },

    #[error("TL-013: Unknown provider '{name}'. Available: openai, mock")]
    UnknownProvider { name: String },

    #[error("TL-014: Invalid connection: {details}")]
    InvalidConnection { details: String },

    // ─────────────────────────────────────────────────────────────
    // External-call errors (TL-020 to TL-029)
    // ─────────────────────────────────────────────────────────────
    #[error("TL-020: Provider error: {0}")]
    Provider(String),

    #[error("TL-021: Agent requested unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("TL-022: Tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("TL-023: Agent did not produce a final answer within {turns} turns")]
    AgentTurnLimit { turns: usize },

    // ─────────────────────────────────────────────────────────────
    // Output-shape errors (TL-030 to TL-039)
    // ─────────────────────────────────────────────────────────────
    #[error("TL-030: Invalid JSON output: {details}")]
    InvalidJson { details: String },

    #[error("TL-031: Schema validation failed: {details}")]
    SchemaFailed { details: String },

    // ─────────────────────────────────────────────────────────────
    // Step bodies and plumbing
    // ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Step(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FixSuggestion for TasklineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TasklineError::InvalidMeta { .. } => Some("Give every task and step a non-empty name"),
            TasklineError::InvalidTool { .. } => {
                Some("Tools need a name and a JSON schema of type \"object\" for parameters")
            }
            TasklineError::NotInvocable { .. } => {
                Some("Return the name of one of the selected step's candidates from the selector")
            }
            TasklineError::DuplicateCandidate { .. } => {
                Some("Give every candidate of a selected step a distinct name")
            }
            TasklineError::ConnectionNotFound { .. } => {
                Some("Run `taskline config -c <name>` and fill in the generated file")
            }
            TasklineError::IllegalConfiguration { .. } => {
                Some("Set non-empty model, base_url and api_key in the connection file")
            }
            TasklineError::InvalidConnectionName { .. } => {
                Some("Use only letters, digits, '.', '_' and '-' in connection names")
            }
            TasklineError::UnknownProvider { .. } => {
                Some("Set \"provider\" to \"openai\" (any compatible endpoint) or \"mock\"")
            }
            TasklineError::InvalidConnection { .. } => {
                Some("Set provider and model; non-mock connections also need base_url and api_key")
            }
            TasklineError::Provider(_) => {
                Some("Check base_url, api_key and model of the connection")
            }
            TasklineError::UnknownTool { .. } => {
                Some("Register the tool on the agent step or adjust the prompt")
            }
            TasklineError::Tool { .. } => None,
            TasklineError::AgentTurnLimit { .. } => {
                Some("Simplify the agent prompt or reduce the number of tools")
            }
            TasklineError::InvalidJson { .. } => {
                Some("Ask the model for JSON only, or use a text output spec")
            }
            TasklineError::SchemaFailed { .. } => Some("Fix output to match declared schema"),
            TasklineError::Step(_) => None,
            TasklineError::Io(_) => Some("Check file path and permissions"),
            TasklineError::Json(_) => None,
        }
    }
}

impl TasklineError {
    /// Wrap an error raised by a step body
    ///
    /// A body that fails with a `TasklineError` (e.g. a nested run) keeps it.
    pub fn from_step(err: anyhow::Error) -> Self {
        match err.downcast::<TasklineError>() {
            Ok(inner) => inner,
            Err(other) => TasklineError::Step(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_step_unwraps_own_errors() {
        let err = TasklineError::from_step(anyhow::Error::new(TasklineError::InvalidJson {
            details: "x".to_string(),
        }));
        assert!(matches!(err, TasklineError::InvalidJson { .. }));

        let err = TasklineError::from_step(anyhow::anyhow!("boom"));
        assert!(matches!(err, TasklineError::Step(_)));
    }

    #[test]
    fn step_error_is_transparent() {
        let err = TasklineError::Step(anyhow::anyhow!("division by zero"));
        assert_eq!(err.to_string(), "division by zero");
        assert!(err.fix_suggestion().is_none());
    }

    #[test]
    fn codes_appear_in_messages() {
        let err = TasklineError::NotInvocable {
            selector: "route".to_string(),
            selected: "42".to_string(),
        };
        assert!(err.to_string().starts_with("TL-003"));
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn connection_errors_show_path() {
        let err = TasklineError::ConnectionNotFound {
            name: "default".to_string(),
            path: PathBuf::from("/tmp/connections/default.json"),
        };
        assert!(err.to_string().contains("/tmp/connections/default.json"));
    }
}
