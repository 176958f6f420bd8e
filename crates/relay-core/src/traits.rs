use async_trait::async_trait;

use crate::{ProviderDescriptor, ProviderResult, Request, Response};

/// Trait for upstream AI backends that can produce a completion for a request.
///
/// Implementations own their transport entirely; the orchestrator only sees
/// this contract.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the static description this provider was registered with.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Returns the unique identifier for this provider.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Cheap local check that the provider is configured and enabled.
    ///
    /// Must not perform network I/O.
    fn is_available(&self) -> bool {
        self.descriptor().enabled
    }

    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` describing why the upstream call failed.
    async fn generate_response(&self, request: &Request) -> ProviderResult<Response>;

    /// Structural sanity check on a response produced by this provider.
    fn validate_response(&self, response: &Response) -> bool {
        response.is_valid()
    }

    /// Estimates the cost in USD for the given number of tokens.
    fn estimate_cost(&self, tokens_used: u64) -> f64 {
        tokens_used as f64 / 1000.0 * self.descriptor().cost_per_1k_tokens
    }
}
