//! Task definition and the sequential run loop
//!
//! A [`TaskSpec`] is immutable and reusable: every call to [`TaskSpec::run`]
//! gets its own context and repository, so one spec can serve many
//! concurrent runs.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::context::TaskContext;
use crate::error::Result;
use crate::facade::{LlmFacade, ProviderFacade};
use crate::invocation::Invocation;
use crate::message::MessageHistory;
use crate::meta::TaskMeta;
use crate::output_spec::OutputSpec;
use crate::record::{InvocationRecords, TaskArgument, TaskRecord};

/// A named pipeline of steps
#[derive(Debug, Clone)]
pub struct TaskSpec {
    meta: TaskMeta,
    steps: Vec<Invocation>,
}

impl TaskSpec {
    pub fn new(meta: TaskMeta, steps: Vec<Invocation>) -> Self {
        Self { meta, steps }
    }

    /// Task made of one step
    pub fn from_single_step(meta: TaskMeta, step: impl Into<Invocation>) -> Self {
        Self::new(meta, vec![step.into()])
    }

    /// Task named after its only step; the step's intent becomes the task intent
    pub fn from_single_step_named(
        name: impl Into<String>,
        step: impl Into<Invocation>,
    ) -> Result<Self> {
        let step = step.into();
        let meta = TaskMeta::new(name)?.with_intent(step.meta().intent.clone());
        Ok(Self::new(meta, vec![step]))
    }

    /// Append a step
    pub fn with_step(mut self, step: impl Into<Invocation>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn steps(&self) -> &[Invocation] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Output shape of the last step; `None` for an empty task
    pub fn output_spec(&self) -> Option<&OutputSpec> {
        self.steps.last().and_then(Invocation::output_spec)
    }

    /// Run with the default [`ProviderFacade`]
    pub async fn run(&self, input: Value, history: Option<MessageHistory>) -> Result<TaskRecord> {
        self.run_with(Arc::new(ProviderFacade::default()), input, history)
            .await
    }

    /// Run every step in order, feeding each output into the next step
    ///
    /// The first failing step aborts the run; its error is returned as is
    /// and no partial record is produced.
    #[instrument(skip_all, fields(task = %self.meta.name, steps = self.steps.len()))]
    pub async fn run_with(
        &self,
        facade: Arc<dyn LlmFacade>,
        input: Value,
        history: Option<MessageHistory>,
    ) -> Result<TaskRecord> {
        let start = Instant::now();
        info!("Task started");

        let argument = TaskArgument::new(input.clone(), history);
        let mut context = TaskContext::new(self.meta.clone(), argument, facade);
        let mut records = InvocationRecords::new();
        let mut current = input;

        for (index, step) in self.steps.iter().enumerate() {
            debug!(index, step = step.name(), kind = %step.kind(), "Invoking step");

            let step_records = step.invoke(current, &context).await?;
            context.apply_updates(step_records.repository_updates.clone());
            records = records.updated(step_records);
            current = records.output().cloned().unwrap_or(Value::Null);
        }

        let record = TaskRecord::new(
            self.meta.name.clone(),
            records,
            context.repository().snapshot(),
        );
        info!(
            invocations = record.invocation_records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Task completed"
        );
        Ok(record)
    }
}
