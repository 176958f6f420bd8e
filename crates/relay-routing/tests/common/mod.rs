//! Common test utilities and helpers for relay-routing tests
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::missing_panics_doc,
        reason = "Test allows"
    )
)]

use relay_core::{Clock, ManualClock, Provider, RelayConfig, Strategy};
use relay_providers::MockProvider;
use relay_routing::ProviderManager;
use std::env;
use std::sync::{Arc, Once};
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests (idempotent).
/// Honors `RUST_LOG` if set, otherwise defaults to "debug".
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_owned());
        // Another test binary may already have installed a subscriber
        let _ignored = fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init();
    });
}

/// Manager driven by a manual clock, using `strategy`
pub fn manager_with(config: RelayConfig, strategy: Strategy) -> (ProviderManager, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::starting_now());
    let manager = ProviderManager::new(config)
        .expect("test config is valid")
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    manager.set_strategy(strategy);
    (manager, clock)
}

/// Manager with default configuration, using `strategy`
pub fn manager(strategy: Strategy) -> (ProviderManager, Arc<ManualClock>) {
    manager_with(RelayConfig::default(), strategy)
}

/// Registers a clone of `provider` and hands the original back for inspection
pub fn register(manager: &ProviderManager, provider: MockProvider) -> MockProvider {
    manager
        .register_provider(Arc::new(provider.clone()) as Arc<dyn Provider>)
        .expect("mock descriptor is valid");
    provider
}

/// Content of exactly `len` characters ending in a full stop
pub fn content(len: usize) -> String {
    let mut text = "a".repeat(len.saturating_sub(1));
    text.push('.');
    text
}
