//! Function steps: plain Rust closures inside a task

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::single_record;
use crate::context::TaskContext;
use crate::error::{Result, TasklineError};
use crate::meta::{InvocationKind, InvocationSpecMeta, DEFAULT_FUNCTION_INTENT};
use crate::output_spec::OutputSpec;
use crate::record::{InvocationEffect, InvocationRecords};

/// Body of a function step
pub type StepFn =
    Arc<dyn Fn(Value, &TaskContext) -> anyhow::Result<InvocationEffect> + Send + Sync>;

/// A step backed by a Rust function
///
/// The body gets the previous output and a read-only context. It returns
/// either a bare value or an [`InvocationEffect`] carrying repository writes.
#[derive(Clone)]
pub struct FunctionStep {
    meta: InvocationSpecMeta,
    output_spec: Option<OutputSpec>,
    body: StepFn,
}

impl FunctionStep {
    /// Step whose body also reads the context
    pub fn new<F, R>(meta: InvocationSpecMeta, body: F) -> Self
    where
        F: Fn(Value, &TaskContext) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<InvocationEffect>,
    {
        Self {
            meta,
            output_spec: None,
            body: Arc::new(move |input: Value, ctx: &TaskContext| body(input, ctx).map(Into::into)),
        }
    }

    /// Step whose body only looks at its input
    pub fn from_unary<F, R>(meta: InvocationSpecMeta, body: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<InvocationEffect>,
    {
        Self::new(meta, move |input, _ctx| body(input))
    }

    /// Unary step named `name` with the default intent
    pub fn from_fn<F, R>(name: impl Into<String>, body: F) -> Result<Self>
    where
        F: Fn(Value) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<InvocationEffect>,
    {
        let meta = InvocationSpecMeta::new(name, DEFAULT_FUNCTION_INTENT)?;
        Ok(Self::from_unary(meta, body))
    }

    /// Check every output against `spec`
    pub fn with_output_spec(mut self, spec: OutputSpec) -> Self {
        self.output_spec = Some(spec);
        self
    }

    pub fn meta(&self) -> &InvocationSpecMeta {
        &self.meta
    }

    pub fn output_spec(&self) -> Option<&OutputSpec> {
        self.output_spec.as_ref()
    }

    /// Run the body and record it as a function invocation
    pub fn invoke(&self, input: Value, ctx: &TaskContext) -> Result<InvocationRecords> {
        self.invoke_as(InvocationKind::Function, input, ctx)
    }

    /// Run the body, tagging the record with `kind`
    pub(crate) fn invoke_as(
        &self,
        kind: InvocationKind,
        input: Value,
        ctx: &TaskContext,
    ) -> Result<InvocationRecords> {
        let started_at = Utc::now();
        let effect = (self.body)(input.clone(), ctx).map_err(TasklineError::from_step)?;

        if let Some(spec) = &self.output_spec {
            spec.validate(&effect.output)?;
        }

        Ok(single_record(&self.meta, kind, started_at, input, effect))
    }
}

impl fmt::Debug for FunctionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionStep")
            .field("meta", &self.meta)
            .field("output_spec", &self.output_spec)
            .finish_non_exhaustive()
    }
}
