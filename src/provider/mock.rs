//! Mock provider for testing
//!
//! Returns configurable responses without making real API calls.

use super::{Capabilities, PromptRequest, PromptResponse, Provider, TokenUsage};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock provider that returns predefined responses
///
/// Clones share the response queue and request log.
#[derive(Clone)]
pub struct MockProvider {
    /// Queue of responses to return (FIFO)
    responses: Arc<Mutex<VecDeque<String>>>,
    /// Default response when queue is empty
    default_response: String,
    /// When set, every call fails with this transport error
    failure: Option<String>,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<PromptRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new mock provider with a fixed default response
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: "Mock response".to_string(),
            failure: None,
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create with a queue of responses
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Self::new()
        }
    }

    /// A provider whose every call fails at the transport level
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Set the default response when queue is empty
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Get all requests made to this provider
    pub fn get_requests(&self) -> Vec<PromptRequest> {
        lock(&self.requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<PromptRequest> {
        lock(&self.requests).last().cloned()
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
        lock(&self.requests).push(request.clone());

        if let Some(reason) = &self.failure {
            anyhow::bail!("{}", reason);
        }

        let response_text = lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());

        let usage = TokenUsage::estimate(request.prompt.len(), response_text.len());

        Ok(PromptResponse::success(response_text).with_usage(usage))
    }
}
