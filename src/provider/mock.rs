//! Mock provider for testing
//!
//! Returns scripted responses without making real API calls. A script
//! entry may be plain text or a batch of tool calls, so agent loops can be
//! exercised end to end.

use super::{Capabilities, PromptRequest, PromptResponse, Provider, ToolCall, TokenUsage};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock provider that returns predefined responses
#[derive(Clone)]
pub struct MockProvider {
    /// Queue of responses to return (FIFO)
    responses: Arc<Mutex<VecDeque<PromptResponse>>>,
    /// Default response when queue is empty
    default_response: String,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<PromptRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new mock provider answering "Mock response"
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: "Mock response".to_string(),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create with a queue of text responses
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        for response in responses {
            provider.queue_response(response);
        }
        provider
    }

    /// Set the default response when queue is empty
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Add a text response to the queue
    pub fn queue_response(&self, response: impl Into<String>) {
        lock(&self.responses).push_back(PromptResponse::success(response));
    }

    /// Add a tool-call turn to the queue
    pub fn queue_tool_calls(&self, calls: Vec<ToolCall>) {
        lock(&self.responses).push_back(PromptResponse::tool_calls(calls));
    }

    /// Add a failed turn to the queue
    pub fn queue_failure(&self, error: impl Into<String>) {
        lock(&self.responses).push_back(PromptResponse::failure(error));
    }

    /// Get all requests made to this provider
    pub fn get_requests(&self) -> Vec<PromptRequest> {
        lock(&self.requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<PromptRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Clear all recorded requests
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::mock()
    }

    async fn execute(&self, request: PromptRequest) -> Result<PromptResponse> {
        let prompt_len = request.prompt_len();
        lock(&self.requests).push(request);

        let response = lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| PromptResponse::success(self.default_response.clone()));

        let usage = TokenUsage::estimate(prompt_len, response.content.len());
        Ok(response.with_usage(usage))
    }
}
