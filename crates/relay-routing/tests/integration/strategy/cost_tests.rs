//! Cost-optimized dispatch with the quality gate.

#![allow(
    clippy::tests_outside_test_module,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    missing_docs,
    reason = "Integration tests have different conventions"
)]

use crate::common::{content, manager, register};
use relay_core::{Request, Strategy};
use relay_providers::MockProvider;
use relay_routing::{FailureReason, quality_score};

/// A response that clears the default 0.6 quality threshold.
fn good(name: &str, priority: i32, cost: f64) -> MockProvider {
    MockProvider::new(name)
        .with_priority(priority)
        .with_cost_per_1k_tokens(cost)
        .with_tokens_used(150)
        .with_default_response(content(200))
}

#[tokio::test]
async fn test_cheapest_provider_is_tried_first() {
    let (manager, _clock) = manager(Strategy::CostOptimized);
    let premium = register(&manager, good("premium", 1, 15.0));
    let budget = register(&manager, good("budget", 5, 0.2));

    let response = manager.generate(&Request::new("summarize")).await.unwrap();
    assert_eq!(response.provider_name, "budget");
    assert_eq!(premium.call_count(), 0);
    assert_eq!(budget.call_count(), 1);
}

#[tokio::test]
async fn test_low_quality_answer_is_rejected() {
    let (manager, _clock) = manager(Strategy::CostOptimized);
    let sloppy = register(
        &manager,
        MockProvider::new("sloppy")
            .with_cost_per_1k_tokens(0.01)
            .with_tokens_used(5)
            .with_default_response("ok"),
    );
    register(&manager, good("careful", 1, 3.0));

    let response = manager.generate(&Request::new("explain")).await.unwrap();
    assert_eq!(response.provider_name, "careful");
    assert!(quality_score(&response) >= 0.6);
    assert_eq!(sloppy.call_count(), 1);

    assert_eq!(manager.provider_health("sloppy").unwrap().failure_count, 1);
    let metrics = manager.metrics().provider("sloppy").unwrap();
    assert_eq!(metrics.errors_by_type.get("quality_below_threshold"), Some(&1));
    // The rejected call was still paid for
    assert_eq!(manager.cost_ledger().entries().len(), 2);
}

#[tokio::test]
async fn test_all_rejected_reports_quality_reasons() {
    let (manager, _clock) = manager(Strategy::CostOptimized);
    register(
        &manager,
        MockProvider::new("terse")
            .with_tokens_used(1)
            .with_default_response("no"),
    );

    let error = manager.generate(&Request::new("explain")).await.unwrap_err();
    assert_eq!(error.attempts().len(), 1);
    assert!(matches!(
        error.attempts()[0].reason,
        FailureReason::QualityBelowThreshold { .. }
    ));
    assert!(manager.cache().is_empty());
}
