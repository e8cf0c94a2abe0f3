//! # Invocations
//!
//! A task is an ordered list of [`Invocation`]s. Each variant turns one
//! input value into [`InvocationRecords`]:
//!
//! | Variant | Runs |
//! |---------|------|
//! | [`FunctionStep`] | a plain function of `(input, context)` |
//! | [`LlmStep`] | one completion through the context's facade |
//! | [`AgentStep`] | a tool-using agent through the context's facade |
//! | [`SelectedStep`] | a selector, then the candidate it names |
//!
//! Every invocation appends at least one record; its output is the output of
//! the last record.

mod function;
mod llm;
mod selected;

pub use function::{FunctionStep, StepFn};
pub use llm::{input_text, AgentStep, LlmStep, MessageBuilder};
pub use selected::SelectedStep;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::TaskContext;
use crate::error::Result;
use crate::meta::{InvocationKind, InvocationMeta, InvocationSpecMeta};
use crate::output_spec::OutputSpec;
use crate::record::{InvocationEffect, InvocationRecord, InvocationRecords};

/// One step of a task
#[derive(Debug, Clone)]
pub enum Invocation {
    Function(FunctionStep),
    Llm(LlmStep),
    Agent(AgentStep),
    Selected(SelectedStep),
}

impl Invocation {
    pub fn meta(&self) -> &InvocationSpecMeta {
        match self {
            Invocation::Function(step) => step.meta(),
            Invocation::Llm(step) => step.meta(),
            Invocation::Agent(step) => step.meta(),
            Invocation::Selected(step) => step.meta(),
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn kind(&self) -> InvocationKind {
        match self {
            Invocation::Function(_) => InvocationKind::Function,
            Invocation::Llm(_) => InvocationKind::Llm,
            Invocation::Agent(_) => InvocationKind::Agent,
            Invocation::Selected(_) => InvocationKind::Selector,
        }
    }

    /// Declared output shape, when the step has one
    ///
    /// Selected steps have none: the shape depends on the chosen candidate.
    pub fn output_spec(&self) -> Option<&OutputSpec> {
        match self {
            Invocation::Function(step) => step.output_spec(),
            Invocation::Llm(step) => Some(step.output_spec()),
            Invocation::Agent(step) => Some(step.output_spec()),
            Invocation::Selected(_) => None,
        }
    }

    /// Run the step on `input`
    ///
    /// Boxed so selected steps can dispatch to candidates recursively.
    pub fn invoke<'a>(
        &'a self,
        input: Value,
        ctx: &'a TaskContext,
    ) -> BoxFuture<'a, Result<InvocationRecords>> {
        match self {
            Invocation::Function(step) => Box::pin(async move { step.invoke(input, ctx) }),
            Invocation::Llm(step) => Box::pin(step.invoke(input, ctx)),
            Invocation::Agent(step) => Box::pin(step.invoke(input, ctx)),
            Invocation::Selected(step) => Box::pin(step.invoke(input, ctx)),
        }
    }
}

impl From<FunctionStep> for Invocation {
    fn from(step: FunctionStep) -> Self {
        Invocation::Function(step)
    }
}

impl From<LlmStep> for Invocation {
    fn from(step: LlmStep) -> Self {
        Invocation::Llm(step)
    }
}

impl From<AgentStep> for Invocation {
    fn from(step: AgentStep) -> Self {
        Invocation::Agent(step)
    }
}

impl From<SelectedStep> for Invocation {
    fn from(step: SelectedStep) -> Self {
        Invocation::Selected(step)
    }
}

/// Wrap a finished effect into a single-record result
pub(crate) fn single_record(
    spec_meta: &InvocationSpecMeta,
    kind: InvocationKind,
    started_at: DateTime<Utc>,
    input: Value,
    effect: InvocationEffect,
) -> InvocationRecords {
    let meta = InvocationMeta::finish(spec_meta.clone(), kind, started_at);
    tracing::debug!(
        step = %spec_meta.name,
        kind = %kind,
        duration_ms = meta.duration().num_milliseconds(),
        updates = effect.repository_updates.len(),
        "Step finished"
    );
    InvocationRecords::single(
        InvocationRecord::new(meta, input, effect.output),
        effect.repository_updates,
    )
}
