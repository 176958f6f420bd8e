//! Report generation for orchestrator statistics.

use super::collector::{MetricsCollector, ProviderMetrics};
use crate::cache::CacheMetrics;
use crate::cost::CostLedger;
use serde::{Deserialize, Serialize};
use std::fmt::{Error as FmtError, Write as _};

/// Per-provider row of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBreakdown {
    /// Provider name
    pub provider: String,
    /// Number of calls
    pub requests: u64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Average latency in milliseconds
    pub avg_latency_ms: f64,
    /// Tokens consumed
    pub tokens_used: u64,
    /// Spend recorded today in USD
    pub cost_today: f64,
}

/// Snapshot of everything the orchestrator has counted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsReport {
    /// Provider calls across all providers
    pub total_requests: u64,
    /// Success rate over all provider calls (0.0 to 1.0)
    pub success_rate: f64,
    /// Requests answered from cache
    pub cache_hits: u64,
    /// Cache counters
    pub cache: CacheMetrics,
    /// Spend recorded today in USD
    pub total_cost_today: f64,
    /// Breakdown by provider, ordered by name
    pub providers: Vec<ProviderBreakdown>,
}

/// Metrics report generator
pub struct MetricsReport;

impl MetricsReport {
    /// Generates a report from the collector, cache counters, and ledger
    pub fn generate(
        collector: &MetricsCollector,
        cache: CacheMetrics,
        ledger: &CostLedger,
    ) -> StatisticsReport {
        let rows = collector.all();
        let total_requests: u64 = rows.iter().map(|row| row.total_requests).sum();
        let successful: u64 = rows.iter().map(|row| row.successful_requests).sum();

        let providers: Vec<ProviderBreakdown> = rows
            .iter()
            .map(|row| Self::breakdown(row, ledger))
            .collect();
        StatisticsReport {
            total_requests,
            success_rate: if total_requests == 0 {
                0.0
            } else {
                successful as f64 / total_requests as f64
            },
            cache_hits: collector.cache_hits(),
            cache,
            total_cost_today: ledger.total_today(),
            providers,
        }
    }

    fn breakdown(metrics: &ProviderMetrics, ledger: &CostLedger) -> ProviderBreakdown {
        ProviderBreakdown {
            provider: metrics.provider_name.clone(),
            requests: metrics.total_requests,
            success_rate: metrics.success_rate(),
            avg_latency_ms: metrics.average_response_time_ms(),
            tokens_used: metrics.total_tokens_used,
            cost_today: ledger.spent_today(&metrics.provider_name),
        }
    }

    /// Formats a report as a human-readable string
    ///
    /// # Errors
    /// Returns an error if formatting fails
    pub fn format_report(report: &StatisticsReport) -> Result<String, FmtError> {
        let mut output = String::new();

        writeln!(output, "Total Requests: {}", report.total_requests)?;
        writeln!(output, "Success Rate: {:.1}%", report.success_rate * 100.0)?;
        writeln!(
            output,
            "Cache: {} hits / {} misses ({:.1}% hit rate, {} entries)",
            report.cache.hits,
            report.cache.misses,
            report.cache.hit_rate * 100.0,
            report.cache.size
        )?;
        writeln!(output, "Cost Today: ${:.4}", report.total_cost_today)?;

        writeln!(output, "\nProviders:")?;
        for row in &report.providers {
            writeln!(
                output,
                "  {}: {} requests ({:.1}% ok, {:.0}ms avg, {} tokens) - ${:.4}",
                row.provider,
                row.requests,
                row.success_rate * 100.0,
                row.avg_latency_ms,
                row.tokens_used,
                row.cost_today
            )?;
        }

        Ok(output)
    }
}
