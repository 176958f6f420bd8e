//! Fallback-chain and primary-only behaviour.

#![allow(
    clippy::tests_outside_test_module,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    clippy::panic,
    missing_docs,
    reason = "Integration tests have different conventions"
)]

use crate::common::{content, manager, register};
use core::time::Duration;
use relay_core::{CostLimit, ProviderError, Request, Strategy};
use relay_providers::MockProvider;
use relay_routing::{FailureReason, RoutingError};
use tokio_util::sync::CancellationToken;

fn failing(name: &str, priority: i32) -> MockProvider {
    MockProvider::new(name)
        .with_priority(priority)
        .with_failure(ProviderError::Unavailable(format!("{name} is down")))
}

#[tokio::test]
async fn test_exhaustion_lists_every_attempt() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    for (name, priority) in [("one", 1), ("two", 2), ("three", 3)] {
        register(&manager, failing(name, priority));
    }

    let error = manager.generate(&Request::new("hello")).await.unwrap_err();
    let RoutingError::AllProvidersFailed { attempts } = &error else {
        panic!("expected aggregate failure, got {error:?}");
    };
    let names: Vec<&str> = attempts
        .iter()
        .map(|attempt| attempt.provider.as_str())
        .collect();
    assert_eq!(names, ["one", "two", "three"]);

    for name in ["one", "two", "three"] {
        assert_eq!(manager.provider_health(name).unwrap().failure_count, 1);
        assert!(error.to_string().contains(&format!("{name}: provider unavailable")));
    }
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_invalid_response_moves_to_next_provider() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    register(
        &manager,
        MockProvider::new("blank")
            .with_priority(1)
            .with_default_response("   "),
    );
    register(
        &manager,
        MockProvider::new("solid")
            .with_priority(2)
            .with_default_response(content(40)),
    );

    let response = manager.generate(&Request::new("hello")).await.unwrap();
    assert_eq!(response.provider_name, "solid");

    let blank = manager.metrics().provider("blank").unwrap();
    assert_eq!(blank.errors_by_type.get("validation_failed"), Some(&1));
    assert_eq!(manager.provider_health("blank").unwrap().failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure_and_falls_through() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    let slow = register(
        &manager,
        MockProvider::new("slow")
            .with_priority(1)
            .with_latency(Duration::from_secs(5))
            .with_timeout(Duration::from_millis(100)),
    );
    register(&manager, MockProvider::new("quick").with_priority(2));

    let response = manager.generate(&Request::new("hello")).await.unwrap();
    assert_eq!(response.provider_name, "quick");
    assert_eq!(slow.call_count(), 1, "a timed out call is not retried");

    let metrics = manager.metrics().provider("slow").unwrap();
    assert_eq!(metrics.errors_by_type.get("timeout"), Some(&1));
    assert_eq!(manager.provider_health("slow").unwrap().consecutive_failures, 1);
}

#[tokio::test]
async fn test_cost_gate_skips_without_health_penalty() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    let pricey = register(
        &manager,
        MockProvider::new("pricey")
            .with_priority(1)
            .with_cost_per_1k_tokens(0.5),
    );
    register(&manager, MockProvider::new("free").with_priority(2));

    let ledger = manager.cost_ledger();
    ledger.set_limit(
        "pricey",
        CostLimit {
            daily_limit: Some(1.0),
            alert_threshold: Some(0.5),
        },
    );
    ledger.record_cost("pricey", 0.6, 0.6, 1200);

    // 1 prompt token plus 999 completion tokens at $0.50 per thousand
    let request = Request::new("abcd").with_max_tokens(999);
    assert!(!ledger.can_make_request("pricey", 0.5));

    let response = manager.generate(&request).await.unwrap();
    assert_eq!(response.provider_name, "free");
    assert_eq!(pricey.call_count(), 0);

    let health = manager.provider_health("pricey").unwrap();
    assert_eq!(health.failure_count, 0);
    assert_eq!(health.consecutive_failures, 0);
}

#[tokio::test]
async fn test_every_provider_over_budget() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    register(&manager, MockProvider::new("only").with_cost_per_1k_tokens(5.0));
    manager.cost_ledger().set_limit(
        "only",
        CostLimit {
            daily_limit: Some(1.0),
            alert_threshold: None,
        },
    );

    let error = manager.generate(&Request::new("hello")).await.unwrap_err();
    let attempts = error.attempts();
    assert_eq!(attempts.len(), 1);
    assert!(matches!(
        attempts[0].reason,
        FailureReason::CostLimitExceeded { .. }
    ));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_primary_only_cost_limit() {
    let (manager, _clock) = manager(Strategy::PrimaryOnly);
    let primary = register(
        &manager,
        MockProvider::new("primary")
            .with_priority(1)
            .with_cost_per_1k_tokens(2.0),
    );
    register(&manager, MockProvider::new("secondary").with_priority(2));
    manager.cost_ledger().set_limit(
        "primary",
        CostLimit {
            daily_limit: Some(1.0),
            alert_threshold: None,
        },
    );

    let error = manager.generate(&Request::new("hello")).await.unwrap_err();
    match error {
        RoutingError::CostLimitExceeded {
            provider,
            estimated,
            remaining,
        } => {
            assert_eq!(provider, "primary");
            assert!(estimated > remaining);
        }
        other => panic!("expected cost limit error, got {other:?}"),
    }
    assert_eq!(primary.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_the_chain() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    register(
        &manager,
        MockProvider::new("slow")
            .with_priority(1)
            .with_latency(Duration::from_secs(10)),
    );
    let next = register(&manager, MockProvider::new("next").with_priority(2));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let error = manager
        .generate_with_cancel(&Request::new("hello"), &cancel)
        .await
        .unwrap_err();

    assert_eq!(error.attempts().len(), 1);
    assert!(matches!(
        error.attempts()[0].reason,
        FailureReason::Provider(ProviderError::Cancelled)
    ));
    assert_eq!(next.call_count(), 0);
    assert_eq!(manager.provider_health("slow").unwrap().failure_count, 0);
}
