//! Circuit breaker behaviour observed through the orchestrator.

#![allow(
    clippy::tests_outside_test_module,
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    missing_docs,
    reason = "Integration tests have different conventions"
)]

use crate::common::{manager, manager_with, register};
use core::time::Duration;
use relay_core::{Clock as _, HealthConfig, ProviderError, RelayConfig, Request, Strategy};
use relay_providers::MockProvider;
use relay_routing::HealthState;

fn flaky() -> MockProvider {
    MockProvider::new("flaky")
        .with_priority(1)
        .with_failure(ProviderError::Timeout { timeout_ms: 1000 })
}

#[tokio::test]
async fn test_five_failures_trip_the_breaker() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    let flaky = register(&manager, flaky());
    register(&manager, MockProvider::new("backup").with_priority(2));

    for attempt in 0..5 {
        let response = manager
            .generate(&Request::new(format!("attempt {attempt}")))
            .await
            .unwrap();
        assert_eq!(response.provider_name, "backup");
    }

    let health = manager.provider_health("flaky").unwrap();
    assert!(health.disabled);
    assert_eq!(health.consecutive_failures, 5);

    manager.generate(&Request::new("attempt 5")).await.unwrap();
    assert_eq!(flaky.call_count(), 5, "tripped provider is not called");
}

#[tokio::test]
async fn test_provider_returns_after_cooldown_and_success_resets() {
    let (manager, clock) = manager(Strategy::FallbackChain);
    let flaky = register(&manager, flaky());
    register(&manager, MockProvider::new("backup").with_priority(2));

    for attempt in 0..5 {
        manager
            .generate(&Request::new(format!("attempt {attempt}")))
            .await
            .unwrap();
    }
    let until = manager.provider_health("flaky").unwrap().disabled_until.unwrap();
    assert!(matches!(
        manager.provider_health("flaky").unwrap().state(clock.now()),
        HealthState::CoolingDown(at) if at == until
    ));

    clock.advance(Duration::from_secs(301));
    flaky.set_failure(None);

    let response = manager.generate(&Request::new("recovered")).await.unwrap();
    assert_eq!(response.provider_name, "flaky");

    let health = manager.provider_health("flaky").unwrap();
    assert!(!health.disabled);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.success_count, 1);
    assert_eq!(health.failure_count, 5);
}

#[tokio::test]
async fn test_failure_after_cooldown_trips_again() {
    let config = RelayConfig {
        health: HealthConfig {
            max_consecutive_failures: 2,
            cooldown_ms: 1_000,
        },
        ..RelayConfig::default()
    };
    let (manager, clock) = manager_with(config, Strategy::FallbackChain);
    let flaky = register(&manager, flaky());
    register(&manager, MockProvider::new("backup").with_priority(2));

    manager.generate(&Request::new("one")).await.unwrap();
    manager.generate(&Request::new("two")).await.unwrap();
    assert!(manager.provider_health("flaky").unwrap().disabled);

    clock.advance(Duration::from_millis(1_000));
    manager.generate(&Request::new("three")).await.unwrap();
    assert_eq!(flaky.call_count(), 3);
    assert!(manager.provider_health("flaky").unwrap().disabled);
}

#[tokio::test]
async fn test_enable_clears_the_streak() {
    let (manager, _clock) = manager(Strategy::FallbackChain);
    register(&manager, flaky());
    register(&manager, MockProvider::new("backup").with_priority(2));

    for attempt in 0..5 {
        manager
            .generate(&Request::new(format!("attempt {attempt}")))
            .await
            .unwrap();
    }
    manager.enable_provider("flaky").unwrap();

    let health = manager.provider_health("flaky").unwrap();
    assert!(!health.disabled);
    assert_eq!(health.consecutive_failures, 0);
}
