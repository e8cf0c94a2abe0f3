//! Execution context handed to every step
//!
//! The context bundles what a step may look at while it runs:
//!
//! - the task argument (initial input and history) and task metadata
//! - the run's [`StateRepository`], read-only
//! - the [`LlmFacade`] used to reach the LLM boundary
//!
//! Steps only ever get `&TaskContext`. Repository writes go through the
//! effect a step returns and are applied by the run between steps.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::facade::LlmFacade;
use crate::message::MessageHistory;
use crate::meta::TaskMeta;
use crate::record::TaskArgument;
use crate::repository::{RepositoryUpdates, StateRepository};

pub struct TaskContext {
    task_argument: TaskArgument,
    task_meta: TaskMeta,
    facade: Arc<dyn LlmFacade>,
    repository: StateRepository,
}

impl TaskContext {
    /// Context with a fresh, empty repository
    pub fn new(
        task_meta: TaskMeta,
        task_argument: TaskArgument,
        facade: Arc<dyn LlmFacade>,
    ) -> Self {
        Self {
            task_argument,
            task_meta,
            facade,
            repository: StateRepository::new(),
        }
    }

    pub fn task_argument(&self) -> &TaskArgument {
        &self.task_argument
    }

    pub fn task_meta(&self) -> &TaskMeta {
        &self.task_meta
    }

    pub fn initial_input(&self) -> &Value {
        &self.task_argument.initial_input
    }

    pub fn initial_history(&self) -> Option<&MessageHistory> {
        self.task_argument.initial_history.as_ref()
    }

    pub fn facade(&self) -> &dyn LlmFacade {
        self.facade.as_ref()
    }

    pub fn repository(&self) -> &StateRepository {
        &self.repository
    }

    /// Apply the updates a step requested
    pub(crate) fn apply_updates(&mut self, updates: RepositoryUpdates) {
        self.repository.update(updates);
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_meta", &self.task_meta)
            .field("task_argument", &self.task_argument)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::ProviderFacade;
    use crate::message::InputMessage;
    use serde_json::json;

    fn context() -> TaskContext {
        let meta = TaskMeta::new("ctx-test").unwrap();
        let argument = TaskArgument::new(
            json!("hello"),
            Some(MessageHistory::new(vec![InputMessage::user("earlier")])),
        );
        TaskContext::new(meta, argument, Arc::new(ProviderFacade::default()))
    }

    #[test]
    fn exposes_task_argument() {
        let ctx = context();
        assert_eq!(ctx.initial_input(), &json!("hello"));
        assert_eq!(ctx.initial_history().unwrap().len(), 1);
        assert_eq!(ctx.task_meta().name, "ctx-test");
    }

    #[test]
    fn starts_with_empty_repository() {
        let ctx = context();
        assert!(ctx.repository().is_empty());
    }

    #[test]
    fn apply_updates_writes_repository() {
        let mut ctx = context();
        ctx.apply_updates([("k".to_string(), json!(1))].into_iter().collect());
        assert_eq!(ctx.repository().get("k"), Some(&json!(1)));
    }
}
