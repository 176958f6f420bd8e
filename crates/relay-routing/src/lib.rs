//! Multi-provider request orchestration.
//!
//! [`ProviderManager`] accepts a single "generate" request and routes it to
//! one or more registered providers according to a [`Strategy`]. Along the
//! way it consults a TTL [`ResponseCache`], a circuit-breaking
//! [`HealthTracker`] and a budget-enforcing [`CostLedger`], and records
//! everything in a [`MetricsCollector`].

/// Response caching keyed by request fingerprint
pub mod cache;
/// Daily spend tracking and budget checks
pub mod cost;
/// Error types for orchestration
pub mod error;
/// Per-provider circuit breaker
pub mod health;
/// Request counters and reports
pub mod metrics;
/// Public orchestrator API
pub mod orchestrator;
/// Registered provider lookup
pub mod registry;
/// Dispatch strategies and scoring
pub mod strategy;

pub use cache::{CacheEntry, CacheMetrics, ResponseCache, fingerprint};
pub use cost::{CostEntry, CostLedger};
pub use error::{AttemptFailure, FailureReason, Result, RoutingError};
pub use health::{HealthState, HealthTracker, ProviderHealth};
pub use metrics::{
    MetricsCollector, MetricsReport, ProviderBreakdown, ProviderMetrics, StatisticsReport,
};
pub use orchestrator::ProviderManager;
pub use registry::ProviderRegistry;
pub use strategy::{Strategy, StrategyExecutor, comparison_score, estimate_tokens, quality_score};
