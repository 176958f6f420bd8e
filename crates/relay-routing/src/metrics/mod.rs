//! Metrics collection and reporting for provider calls.
//!
//! This module tracks per-provider request counters and turns them, together
//! with cache and cost data, into summary reports.

/// Metrics collection
pub mod collector;
/// Report generation
pub mod reporter;

pub use collector::{MetricsCollector, ProviderMetrics};
pub use reporter::{MetricsReport, ProviderBreakdown, StatisticsReport};
