//! Selected steps: runtime choice between candidate steps

use std::fmt;

use serde_json::Value;

use super::Invocation;
use crate::context::TaskContext;
use crate::error::{Result, TasklineError};
use crate::invocation::FunctionStep;
use crate::meta::{InvocationKind, InvocationSpecMeta};
use crate::record::InvocationRecords;

/// A step that lets a selector function pick which candidate runs
///
/// The selector receives the step input and must return the name of one
/// candidate as a JSON string. The chosen candidate then runs on the same
/// input. Both invocations are recorded, selector first. Candidate names are
/// unique within one step.
#[derive(Clone)]
pub struct SelectedStep {
    meta: InvocationSpecMeta,
    selector: FunctionStep,
    candidates: Vec<Invocation>,
}

impl SelectedStep {
    pub fn new(
        meta: InvocationSpecMeta,
        selector: FunctionStep,
        candidates: Vec<Invocation>,
    ) -> Result<Self> {
        let mut step = Self {
            meta,
            selector,
            candidates: Vec::with_capacity(candidates.len()),
        };
        for candidate in candidates {
            step = step.with_candidate(candidate)?;
        }
        Ok(step)
    }

    /// Add one more candidate
    pub fn with_candidate(mut self, candidate: impl Into<Invocation>) -> Result<Self> {
        let candidate = candidate.into();
        if self.candidates.iter().any(|c| c.name() == candidate.name()) {
            return Err(TasklineError::DuplicateCandidate {
                step: self.meta.name.clone(),
                name: candidate.name().to_string(),
            });
        }
        self.candidates.push(candidate);
        Ok(self)
    }

    pub fn meta(&self) -> &InvocationSpecMeta {
        &self.meta
    }

    pub fn selector(&self) -> &FunctionStep {
        &self.selector
    }

    pub fn candidates(&self) -> &[Invocation] {
        &self.candidates
    }

    fn resolve(&self, selected: Option<&Value>) -> Result<&Invocation> {
        let not_invocable = || TasklineError::NotInvocable {
            selector: self.selector.meta().name.clone(),
            selected: selected.map_or_else(|| "nothing".to_string(), Value::to_string),
        };

        let name = selected.and_then(Value::as_str).ok_or_else(not_invocable)?;
        self.candidates
            .iter()
            .find(|candidate| candidate.name() == name)
            .ok_or_else(not_invocable)
    }

    pub async fn invoke(&self, input: Value, ctx: &TaskContext) -> Result<InvocationRecords> {
        let selection = self
            .selector
            .invoke_as(InvocationKind::Selector, input.clone(), ctx)?;
        let chosen = self.resolve(selection.output())?;

        tracing::debug!(
            step = %self.meta.name,
            selected = chosen.name(),
            "Candidate selected"
        );

        let result = chosen.invoke(input, ctx).await?;
        Ok(selection.updated(result))
    }
}

impl fmt::Debug for SelectedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedStep")
            .field("meta", &self.meta)
            .field("selector", &self.selector)
            .field("candidates", &self.candidates)
            .finish()
    }
}
