//! Mock provider for testing orchestration without real API calls.
//!
//! Returns canned responses for specific prompts, synthesizes content for
//! everything else, and can be scripted to fail or respond slowly. With no
//! scripting it always succeeds, which makes it a valid last-resort provider.

use async_trait::async_trait;
use core::time::Duration;
use relay_core::{
    IgnoreLock as _, Provider, ProviderDescriptor, ProviderError, ProviderResult, Request,
    Response,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;

/// Response storage type
type ResponseMap = Arc<Mutex<HashMap<String, String>>>;

/// Model name reported by mock providers unless overridden.
const MOCK_MODEL: &str = "mock-model";

/// Mock provider that returns pre-defined responses based on prompt patterns.
#[derive(Clone)]
pub struct MockProvider {
    /// Registration descriptor
    descriptor: ProviderDescriptor,
    /// Predefined responses keyed by prompt text
    responses: ResponseMap,
    /// Default response if no match found
    default_response: Arc<Mutex<Option<String>>>,
    /// Scripted failure returned instead of a response
    failure: Arc<Mutex<Option<ProviderError>>>,
    /// Simulated upstream latency
    latency: Duration,
    /// Token count reported on every response
    tokens_used: Option<u64>,
    /// Result of `is_available`
    available: Arc<AtomicBool>,
    /// Call history for verification
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new mock provider with a given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_descriptor(ProviderDescriptor::new(name, MOCK_MODEL))
    }

    /// Create a mock provider from a full descriptor.
    #[must_use]
    pub fn with_descriptor(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            latency: Duration::ZERO,
            tokens_used: None,
            available: Arc::new(AtomicBool::new(true)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the selection priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.descriptor.priority = priority;
        self
    }

    /// Set the price per thousand tokens.
    #[must_use]
    pub fn with_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.descriptor.cost_per_1k_tokens = cost;
        self
    }

    /// Set the per-call timeout the orchestrator enforces.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.descriptor.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Add a pattern-based response to the mock provider.
    #[must_use]
    pub fn with_response(self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        {
            let mut responses = self.responses.lock_ignore_poison();
            responses.insert(pattern.into(), response.into());
        }
        self
    }

    /// Set a default response for prompts that don't match any pattern.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        {
            let mut default = self.default_response.lock_ignore_poison();
            *default = Some(response.into());
        }
        self
    }

    /// Make every call fail with the given error.
    #[must_use]
    pub fn with_failure(self, error: ProviderError) -> Self {
        self.set_failure(Some(error));
        self
    }

    /// Delay every call by the given duration.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report a fixed token count on every response.
    #[must_use]
    pub fn with_tokens_used(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    /// Change the scripted failure at runtime; `None` restores success.
    pub fn set_failure(&self, error: Option<ProviderError>) {
        *self.failure.lock_ignore_poison() = error;
    }

    /// Change the availability flag at runtime.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Clear the call history (used for testing).
    pub fn clear_history(&self) {
        let mut history = self.call_history.lock_ignore_poison();
        history.clear();
    }

    /// Get the call history (list of all prompts received).
    #[must_use]
    pub fn get_call_history(&self) -> Vec<String> {
        let history = self.call_history.lock_ignore_poison();
        history.clone()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let history = self.call_history.lock_ignore_poison();
        history.len()
    }

    /// Find a matching response for the given prompt.
    fn find_response(&self, prompt: &str) -> Option<String> {
        let responses = self.responses.lock_ignore_poison();

        // Try exact match first
        if let Some(response) = responses.get(prompt) {
            return Some(response.clone());
        }

        // Try substring match
        responses
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.descriptor.enabled && self.available.load(Ordering::SeqCst)
    }

    async fn generate_response(&self, request: &Request) -> ProviderResult<Response> {
        // Record the call
        {
            let mut history = self.call_history.lock_ignore_poison();
            history.push(request.prompt.clone());
        }

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let failure = self.failure.lock_ignore_poison().clone();
        if let Some(error) = failure {
            tracing::debug!("mock provider {} failing with: {error}", self.descriptor.name);
            return Err(error);
        }

        let content = self.find_response(&request.prompt).unwrap_or_else(|| {
            let default = self.default_response.lock_ignore_poison();
            default
                .clone()
                .unwrap_or_else(|| format!("Mock response for prompt: {}", request.prompt))
        });

        let tokens = self
            .tokens_used
            .unwrap_or_else(|| ((request.prompt.len() + content.len()) / 4) as u64);

        Ok(Response::new(content, self.descriptor.name.clone(), self.descriptor.model.clone())
            .with_tokens_used(tokens)
            .with_response_time_ms(self.latency.as_millis() as u64))
    }
}
