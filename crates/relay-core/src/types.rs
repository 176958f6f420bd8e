use core::time::Duration;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, Result};

/// Opaque pass-through values attached to requests and responses.
///
/// Ordered so that serialization does not depend on insertion order.
pub type Metadata = BTreeMap<String, Value>;

/// Default per-call timeout for a provider.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Static description of an upstream provider, supplied at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider key
    pub name: String,
    /// Lower values are preferred
    #[serde(default)]
    pub priority: i32,
    /// Whether the provider may be selected at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Credential handed to the provider implementation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Endpoint handed to the provider implementation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Model identifier reported in responses
    pub model: String,
    /// Upper bound on completion tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Price in USD per thousand tokens
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ProviderDescriptor {
    /// Creates an enabled descriptor with default limits.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            enabled: true,
            api_key: None,
            endpoint: None,
            model: model.into(),
            max_tokens: None,
            temperature: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cost_per_1k_tokens: 0.0,
        }
    }

    /// Sets the selection priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the price per thousand tokens.
    #[must_use]
    pub fn with_cost_per_1k_tokens(mut self, cost: f64) -> Self {
        self.cost_per_1k_tokens = cost;
        self
    }

    /// Per-call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks the fields the orchestrator relies on.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the name or model is empty or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Config("provider name must not be empty".to_owned()));
        }
        if self.model.trim().is_empty() {
            return Err(CoreError::Config(format!(
                "provider '{}' has no model configured",
                self.name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(CoreError::Config(format!(
                "provider '{}' has a zero timeout",
                self.name
            )));
        }
        if self.cost_per_1k_tokens < 0.0 {
            return Err(CoreError::Config(format!(
                "provider '{}' has a negative cost",
                self.name
            )));
        }
        Ok(())
    }
}

/// A single logical completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// User prompt
    pub prompt: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Optional completion token limit
    pub max_tokens: Option<u32>,
    /// Optional sampling temperature
    pub temperature: Option<f32>,
    /// Pass-through values, part of the cache fingerprint
    #[serde(default)]
    pub metadata: Metadata,
}

impl Request {
    /// Creates a request for the given prompt.
    pub fn new<T: Into<String>>(prompt: T) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            metadata: Metadata::new(),
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// # Errors
    /// Returns `CoreError::InvalidRequest` if the prompt is blank.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(CoreError::InvalidRequest("prompt must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// A completion produced by a provider or served from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Generated text
    pub content: String,
    /// Provider that produced the text
    pub provider_name: String,
    /// Model that produced the text
    pub model: String,
    /// Tokens consumed, when the provider reports them
    pub tokens_used: Option<u64>,
    /// Wall-clock time of the provider call
    pub response_time_ms: u64,
    /// Set by the cache layer only
    #[serde(default)]
    pub cached: bool,
    /// Pass-through values
    #[serde(default)]
    pub metadata: Metadata,
}

impl Response {
    /// Creates an uncached response.
    pub fn new(
        content: impl Into<String>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            provider_name: provider_name.into(),
            model: model.into(),
            tokens_used: None,
            response_time_ms: 0,
            cached: false,
            metadata: Metadata::new(),
        }
    }

    /// Sets the reported token usage.
    #[must_use]
    pub fn with_tokens_used(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    /// Sets the response time.
    #[must_use]
    pub fn with_response_time_ms(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = response_time_ms;
        self
    }

    /// A response is usable only if it carries non-blank content.
    pub fn is_valid(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Copy of this response marked as served from cache.
    #[must_use]
    pub fn as_cached(&self) -> Self {
        let mut copy = self.clone();
        copy.cached = true;
        copy
    }
}
