//! End-to-end request flow through the orchestrator.

#![allow(
    clippy::tests_outside_test_module,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    missing_docs,
    reason = "Integration tests have different conventions"
)]

use crate::common::{content, manager, register};
use async_trait::async_trait;
use relay_core::{
    Provider, ProviderDescriptor, ProviderError, ProviderResult, Request, Response, Strategy,
};
use relay_providers::MockProvider;
use std::sync::Arc;

#[tokio::test]
async fn test_failover_then_cache_hit() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    let failing = register(
        &manager,
        MockProvider::new("a")
            .with_priority(1)
            .with_failure(ProviderError::Unavailable("connection refused".to_owned())),
    );
    let healthy = register(
        &manager,
        MockProvider::new("b")
            .with_priority(2)
            .with_default_response(content(200)),
    );
    let request = Request::new("hi");

    let first = manager.generate(&request).await.unwrap();
    assert_eq!(first.provider_name, "b");
    assert_eq!(first.content.len(), 200);
    assert!(!first.cached);
    assert_eq!(manager.cache().len(), 1);

    let a_health = manager.provider_health("a").unwrap();
    let b_health = manager.provider_health("b").unwrap();
    assert_eq!(a_health.failure_count, 1);
    assert_eq!(b_health.success_count, 1);

    let second = manager.generate(&request).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.content, first.content);
    assert_eq!(failing.call_count(), 1);
    assert_eq!(healthy.call_count(), 1);
    assert_eq!(manager.provider_health("a").unwrap(), a_health);
    assert_eq!(manager.provider_health("b").unwrap(), b_health);
    assert_eq!(manager.metrics().cache_hits(), 1);
}

#[tokio::test]
async fn test_success_updates_every_component() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    register(
        &manager,
        MockProvider::new("priced")
            .with_cost_per_1k_tokens(2.0)
            .with_tokens_used(500)
            .with_default_response(content(120)),
    );

    manager.generate(&Request::new("price me")).await.unwrap();

    let metrics = manager.metrics().provider("priced").unwrap();
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.total_tokens_used, 500);

    let entries = manager.cost_ledger().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].tokens_used, 500);
    assert!((entries[0].actual_cost - 1.0).abs() < 1e-9);
    assert!((manager.cost_ledger().spent_today("priced") - 1.0).abs() < 1e-9);

    let report = manager.metrics_report();
    assert_eq!(report.total_requests, 1);
    assert!((report.total_cost_today - 1.0).abs() < 1e-9);
}

/// Provider that never reports token usage.
struct SilentProvider {
    descriptor: ProviderDescriptor,
}

#[async_trait]
impl Provider for SilentProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn generate_response(&self, request: &Request) -> ProviderResult<Response> {
        Ok(Response::new(
            format!("echo: {}", request.prompt),
            self.descriptor.name.clone(),
            self.descriptor.model.clone(),
        ))
    }
}

#[tokio::test]
async fn test_missing_token_count_falls_back_to_estimate() {
    let (manager, _clock) = manager(Strategy::PrimaryOnly);
    let provider = SilentProvider {
        descriptor: ProviderDescriptor::new("silent", "echo").with_cost_per_1k_tokens(1.0),
    };
    manager.register_provider(Arc::new(provider)).unwrap();

    // 1 prompt token plus a 999 token completion budget
    let request = Request::new("abcd").with_max_tokens(999);
    let response = manager.generate(&request).await.unwrap();
    assert!(response.tokens_used.is_none());

    let entry = manager.cost_ledger().entries().pop().unwrap();
    assert_eq!(entry.tokens_used, 1000);
    assert!((entry.estimated_cost - 1.0).abs() < 1e-9);
    assert!((entry.actual_cost - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_reset_statistics() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    register(&manager, MockProvider::new("alpha"));
    manager.generate(&Request::new("one")).await.unwrap();

    manager.reset_statistics();

    assert!(manager.metrics().is_empty());
    assert!(manager.cost_ledger().entries().is_empty());
    assert_eq!(manager.provider_health("alpha").unwrap().success_count, 0);
    assert_eq!(manager.cache().metrics().misses, 0);
}
