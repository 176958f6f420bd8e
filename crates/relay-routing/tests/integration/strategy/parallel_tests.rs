//! Parallel-comparison dispatch.

#![allow(
    clippy::tests_outside_test_module,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    missing_docs,
    reason = "Integration tests have different conventions"
)]

use crate::common::{content, manager, register};
use core::time::Duration;
use relay_core::{CostLimit, ProviderError, Request, Strategy};
use relay_providers::MockProvider;
use relay_routing::{FailureReason, RoutingError};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_longer_response_wins_every_time() {
    let (manager, _clock) = manager(Strategy::ParallelComparison);
    let short = register(
        &manager,
        MockProvider::new("short")
            .with_priority(1)
            .with_default_response(content(50)),
    );
    let long = register(
        &manager,
        MockProvider::new("long")
            .with_priority(1)
            .with_default_response(content(500)),
    );

    for round in 0..100 {
        let request = Request::new(format!("compare round {round}"));
        let response = manager.generate(&request).await.unwrap();
        assert_eq!(response.provider_name, "long", "round {round}");
    }

    assert_eq!(short.call_count(), 100);
    assert_eq!(long.call_count(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_failing_branch_does_not_block_others() {
    let (manager, _clock) = manager(Strategy::ParallelComparison);
    register(
        &manager,
        MockProvider::new("broken")
            .with_priority(1)
            .with_failure(ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
            }),
    );
    register(
        &manager,
        MockProvider::new("steady")
            .with_priority(2)
            .with_latency(Duration::from_millis(300))
            .with_default_response(content(80)),
    );

    let response = manager.generate(&Request::new("hello")).await.unwrap();
    assert_eq!(response.provider_name, "steady");
    assert!(response.response_time_ms >= 300);

    let broken = manager.provider_health("broken").unwrap();
    assert_eq!(broken.failure_count, 1);
    assert_eq!(manager.provider_health("steady").unwrap().success_count, 1);
}

#[tokio::test]
async fn test_losing_successes_count_as_healthy() {
    let (manager, _clock) = manager(Strategy::ParallelComparison);
    register(
        &manager,
        MockProvider::new("winner").with_default_response(content(900)),
    );
    register(
        &manager,
        MockProvider::new("runner_up").with_default_response(content(90)),
    );

    let response = manager.generate(&Request::new("hello")).await.unwrap();
    assert_eq!(response.provider_name, "winner");

    for name in ["winner", "runner_up"] {
        assert_eq!(manager.provider_health(name).unwrap().success_count, 1);
        assert_eq!(manager.metrics().provider(name).unwrap().successful_requests, 1);
    }
    assert_eq!(manager.cache().len(), 1);
}

#[tokio::test]
async fn test_budget_is_not_consulted() {
    let (manager, _clock) = manager(Strategy::ParallelComparison);
    let spent = register(
        &manager,
        MockProvider::new("spent")
            .with_cost_per_1k_tokens(1.0)
            .with_default_response(content(300)),
    );
    manager.cost_ledger().set_limit(
        "spent",
        CostLimit {
            daily_limit: Some(0.0),
            alert_threshold: None,
        },
    );

    let response = manager.generate(&Request::new("hello")).await.unwrap();
    assert_eq!(response.provider_name, "spent");
    assert_eq!(spent.call_count(), 1);
}

#[tokio::test]
async fn test_all_branches_fail() {
    let (manager, _clock) = manager(Strategy::ParallelComparison);
    for name in ["left", "right"] {
        register(
            &manager,
            MockProvider::new(name).with_failure(ProviderError::AuthFailed("revoked".to_owned())),
        );
    }

    let error = manager.generate(&Request::new("hello")).await.unwrap_err();
    assert!(matches!(error, RoutingError::AllProvidersFailed { .. }));
    assert_eq!(error.attempts().len(), 2);
    assert!(!error.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_reaches_every_branch() {
    let (manager, _clock) = manager(Strategy::ParallelComparison);
    for name in ["a", "b"] {
        register(
            &manager,
            MockProvider::new(name).with_latency(Duration::from_secs(10)),
        );
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let canceller = tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let error = manager
        .generate_with_cancel(&Request::new("race"), &cancel)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();
    canceller.await.unwrap();

    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    assert_eq!(error.attempts().len(), 2);
    assert!(error.attempts().iter().all(|attempt| matches!(
        attempt.reason,
        FailureReason::Provider(ProviderError::Cancelled)
    )));
    for name in ["a", "b"] {
        let health = manager.provider_health(name).unwrap();
        assert_eq!(health.failure_count, 0);
        assert_eq!(health.consecutive_failures, 0);
        let metrics = manager.metrics().provider(name).unwrap();
        assert_eq!(metrics.errors_by_type.get("cancelled"), Some(&1));
    }
    assert!(manager.cache().is_empty());
}
