//! Request/response wrapper around task runs
//!
//! Callers that serve many runs (a CLI, a job queue) submit [`TaskRequest`]s
//! to one [`TaskExecutor`]. The executor owns a shared facade, so provider
//! caching is reused across runs while each run keeps its own repository.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::facade::{LlmFacade, ProviderFacade};
use crate::message::MessageHistory;
use crate::record::TaskRecord;
use crate::task::TaskSpec;

/// One run to perform
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub id: Uuid,
    pub task_spec: Arc<TaskSpec>,
    pub task_input: Value,
    pub history: Option<MessageHistory>,
}

impl TaskRequest {
    pub fn new(task_spec: Arc<TaskSpec>, task_input: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_spec,
            task_input,
            history: None,
        }
    }

    pub fn with_history(mut self, history: MessageHistory) -> Self {
        self.history = Some(history);
        self
    }
}

/// Result of a request, tagged with the request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub record: TaskRecord,
}

impl TaskResponse {
    pub fn output(&self) -> Option<&Value> {
        self.record.output.as_ref()
    }
}

/// Executes task requests against a shared facade
#[derive(Clone)]
pub struct TaskExecutor {
    facade: Arc<dyn LlmFacade>,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ProviderFacade::default()))
    }
}

impl TaskExecutor {
    pub fn new(facade: Arc<dyn LlmFacade>) -> Self {
        Self { facade }
    }

    pub fn facade(&self) -> Arc<dyn LlmFacade> {
        Arc::clone(&self.facade)
    }

    #[instrument(skip_all, fields(request_id = %request.id, task = request.task_spec.name()))]
    pub async fn execute(&self, request: TaskRequest) -> Result<TaskResponse> {
        debug!("Executing task request");
        let record = request
            .task_spec
            .run_with(self.facade(), request.task_input, request.history)
            .await?;
        Ok(TaskResponse {
            id: request.id,
            record,
        })
    }

    /// Execute requests concurrently; results keep the request order
    pub async fn execute_all(&self, requests: Vec<TaskRequest>) -> Vec<Result<TaskResponse>> {
        debug!(count = requests.len(), "Executing task requests concurrently");
        join_all(requests.into_iter().map(|request| self.execute(request))).await
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor").finish_non_exhaustive()
    }
}
