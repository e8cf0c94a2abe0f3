//! Audit records, step effects and the final task record

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::message::MessageHistory;
use crate::meta::InvocationMeta;
use crate::repository::RepositoryUpdates;

/// The original input of a task run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArgument {
    /// Input of the first step
    pub initial_input: Value,
    /// Prior conversation; does not include `initial_input`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_history: Option<MessageHistory>,
}

impl TaskArgument {
    pub fn new(initial_input: Value, initial_history: Option<MessageHistory>) -> Self {
        Self {
            initial_input,
            initial_history,
        }
    }
}

/// Immutable audit entry for one executed invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub id: Uuid,
    pub meta: InvocationMeta,
    pub input: Value,
    pub output: Value,
}

impl InvocationRecord {
    pub fn new(meta: InvocationMeta, input: Value, output: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            meta,
            input,
            output,
        }
    }
}

/// Records produced by one step plus the repository updates it requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecords {
    pub entries: Vec<InvocationRecord>,
    pub repository_updates: RepositoryUpdates,
}

impl InvocationRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single record with the updates of the effect that produced it
    pub fn single(record: InvocationRecord, repository_updates: RepositoryUpdates) -> Self {
        Self {
            entries: vec![record],
            repository_updates,
        }
    }

    /// Concatenate entries (self first) and merge updates (`other` wins)
    pub fn updated(&self, other: InvocationRecords) -> InvocationRecords {
        let mut entries = self.entries.clone();
        entries.extend(other.entries);

        let mut repository_updates = self.repository_updates.clone();
        repository_updates.extend(other.repository_updates);

        InvocationRecords {
            entries,
            repository_updates,
        }
    }

    /// Output of the last entry
    pub fn output(&self) -> Option<&Value> {
        self.entries.last().map(|r| &r.output)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a step body hands back: an output plus repository writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEffect {
    pub output: Value,
    #[serde(default)]
    pub repository_updates: RepositoryUpdates,
}

impl InvocationEffect {
    pub fn new(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            repository_updates: HashMap::new(),
        }
    }

    /// Normalize a bare value or an effect into an effect
    pub fn from_any(value: impl Into<InvocationEffect>) -> Self {
        value.into()
    }

    /// Request one repository write
    pub fn with_update(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.repository_updates.insert(key.into(), value.into());
        self
    }

    /// Request several repository writes
    pub fn with_updates<I, K>(mut self, updates: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.repository_updates
            .extend(updates.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }
}

impl From<Value> for InvocationEffect {
    fn from(output: Value) -> Self {
        InvocationEffect::new(output)
    }
}

/// Final result of one task run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub task_name: String,
    /// Output of the last record; `None` for a task without steps
    pub output: Option<Value>,
    /// Every invocation of the run, in execution order
    pub invocation_records: Vec<InvocationRecord>,
    /// Repository contents at the end of the run
    pub repository_snapshot: HashMap<String, Value>,
}

impl TaskRecord {
    pub fn new(
        task_name: impl Into<String>,
        records: InvocationRecords,
        repository_snapshot: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_name: task_name.into(),
            output: records.output().cloned(),
            invocation_records: records.entries,
            repository_snapshot,
        }
    }

    /// Deserialize the output into a concrete type
    pub fn output_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.output.as_ref().unwrap_or(&Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{InvocationKind, InvocationSpecMeta};
    use chrono::Utc;
    use serde_json::json;

    fn record(name: &str, input: Value, output: Value) -> InvocationRecord {
        let spec = InvocationSpecMeta::new(name, "test").unwrap();
        InvocationRecord::new(
            InvocationMeta::finish(spec, InvocationKind::Function, Utc::now()),
            input,
            output,
        )
    }

    fn records(name: &str, output: Value, updates: &[(&str, Value)]) -> InvocationRecords {
        InvocationRecords::single(
            record(name, Value::Null, output),
            updates.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        )
    }

    #[test]
    fn empty_records_have_no_output() {
        let records = InvocationRecords::new();
        assert!(records.output().is_none());
        assert!(records.is_empty());
    }

    #[test]
    fn updated_concatenates_in_order() {
        let a = records("a", json!(1), &[]);
        let b = records("b", json!(2), &[]);

        let merged = a.updated(b);
        let names: Vec<_> = merged.entries.iter().map(|r| r.meta.spec_name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(merged.output(), Some(&json!(2)));
    }

    #[test]
    fn updated_is_right_biased() {
        let a = records("a", json!(1), &[("k", json!(1)), ("x", json!("keep"))]);
        let b = records("b", json!(2), &[("k", json!(2)), ("j", json!(9))]);

        let merged = a.updated(b);
        assert_eq!(merged.repository_updates["k"], json!(2));
        assert_eq!(merged.repository_updates["j"], json!(9));
        assert_eq!(merged.repository_updates["x"], json!("keep"));
    }

    #[test]
    fn updated_is_associative_in_entries() {
        let a = records("a", json!(1), &[("k", json!("a"))]);
        let b = records("b", json!(2), &[("k", json!("b"))]);
        let c = records("c", json!(3), &[("k", json!("c"))]);

        let left = a.updated(b.clone()).updated(c.clone());
        let right = a.updated(b.updated(c));
        assert_eq!(left, right);
    }

    #[test]
    fn bare_value_becomes_effect() {
        let effect = InvocationEffect::from_any(json!("out"));
        assert_eq!(effect.output, json!("out"));
        assert!(effect.repository_updates.is_empty());
    }

    #[test]
    fn effect_passes_through() {
        let effect = InvocationEffect::new(json!(1)).with_update("k", 1);
        let same = InvocationEffect::from_any(effect.clone());
        assert_eq!(same, effect);
    }

    #[test]
    fn records_get_unique_ids() {
        let a = record("a", json!(1), json!(1));
        let b = record("a", json!(1), json!(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn task_record_output_as() {
        let records = records("a", json!({"count": 3}), &[]);
        let task = TaskRecord::new("t", records, HashMap::new());

        #[derive(Deserialize)]
        struct Out {
            count: u32,
        }
        let out: Out = task.output_as().unwrap();
        assert_eq!(out.count, 3);
    }

    #[test]
    fn task_record_serializes() {
        let task = TaskRecord::new(
            "t",
            records("a", json!("x"), &[("k", json!(1))]),
            HashMap::new(),
        );
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["task_name"], "t");
        assert_eq!(value["invocation_records"][0]["meta"]["kind"], "function");
    }
}
