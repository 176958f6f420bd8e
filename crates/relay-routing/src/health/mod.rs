//! Provider health tracking (circuit breaker).

/// Health state machine
pub mod tracker;

pub use tracker::{HealthState, HealthTracker, ProviderHealth};
