//! Static descriptions of tasks and steps, and per-execution step metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TasklineError};

/// Intent used when a step is built from a bare function name
pub const DEFAULT_FUNCTION_INTENT: &str = "an invocation function";

/// Description of a whole task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    /// Human-readable task name
    pub name: String,
    /// What the overall task is intended to do
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Guiding rules or constraints for this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<String>>,
    /// Optional longer explanation of the task purpose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskMeta {
    /// Create task metadata; the name must not be blank
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TasklineError::InvalidMeta { field: "name" });
        }
        Ok(Self {
            name,
            intent: None,
            rules: None,
            description: None,
        })
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = Some(rules.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Description of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationSpecMeta {
    /// Name of the step
    pub name: String,
    /// Intent of the step
    pub intent: String,
}

impl InvocationSpecMeta {
    pub fn new(name: impl Into<String>, intent: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TasklineError::InvalidMeta { field: "name" });
        }
        Ok(Self {
            name,
            intent: intent.into(),
        })
    }
}

/// The four step kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationKind {
    Function,
    Llm,
    Agent,
    Selector,
}

impl InvocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationKind::Function => "function",
            InvocationKind::Llm => "llm",
            InvocationKind::Agent => "agent",
            InvocationKind::Selector => "selector",
        }
    }
}

impl std::fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationMeta {
    pub spec_meta: InvocationSpecMeta,
    pub kind: InvocationKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl InvocationMeta {
    /// Close an invocation that started at `started_at`.
    ///
    /// The wall clock may step backwards; `ended_at` never precedes `started_at`.
    pub fn finish(
        spec_meta: InvocationSpecMeta,
        kind: InvocationKind,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            spec_meta,
            kind,
            started_at,
            ended_at: Utc::now().max(started_at),
        }
    }

    pub fn spec_name(&self) -> &str {
        &self.spec_meta.name
    }

    pub fn intent(&self) -> &str {
        &self.spec_meta.intent
    }

    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_meta_requires_name() {
        assert!(TaskMeta::new("").is_err());
        assert!(TaskMeta::new("   ").is_err());

        let meta = TaskMeta::new("IncidentNotification")
            .unwrap()
            .with_intent("Notify users")
            .with_rules(["Do not invent incidents"]);
        assert_eq!(meta.name, "IncidentNotification");
        assert_eq!(meta.rules.as_deref(), Some(&["Do not invent incidents".to_string()][..]));
    }

    #[test]
    fn spec_meta_requires_name() {
        let err = InvocationSpecMeta::new("", "intent").unwrap_err();
        assert!(matches!(err, TasklineError::InvalidMeta { field: "name" }));
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&InvocationKind::Selector).unwrap();
        assert_eq!(json, "\"selector\"");
        assert_eq!(InvocationKind::Llm.to_string(), "llm");
    }

    #[test]
    fn finish_never_ends_before_start() {
        let spec = InvocationSpecMeta::new("step", "intent").unwrap();
        let future = Utc::now() + chrono::Duration::seconds(60);
        let meta = InvocationMeta::finish(spec, InvocationKind::Function, future);

        assert!(meta.ended_at >= meta.started_at);
        assert_eq!(meta.duration(), chrono::Duration::zero());
        assert_eq!(meta.spec_name(), "step");
    }
}
