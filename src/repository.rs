//! Shared key/value state for one task run
//!
//! One repository is created per run and dropped with it. Steps read it through
//! the [`TaskContext`](crate::context::TaskContext); writes only happen between
//! steps, when the run applies the repository updates a step returned.

use std::collections::HashMap;

use serde_json::Value;

/// Key → value updates requested by a step
pub type RepositoryUpdates = HashMap<String, Value>;

/// Key/value store threaded through a single run
#[derive(Debug, Clone, Default)]
pub struct StateRepository {
    data: HashMap<String, Value>,
}

impl StateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value, falling back to `default` when the key is absent
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    /// Set a value (overwrites)
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Merge several keys at once; incoming keys overwrite existing ones
    pub fn update<I, K>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in updates {
            self.data.insert(key.into(), value);
        }
    }

    /// Independent copy of the current contents
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.data.clone()
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
