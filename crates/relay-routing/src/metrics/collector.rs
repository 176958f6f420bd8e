//! Per-provider request counters.

use relay_core::IgnoreLock as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one provider.
///
/// Averages and rates are derived on read and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    /// Provider the counters belong to
    pub provider_name: String,
    /// Calls made
    pub total_requests: u64,
    /// Calls that produced an accepted response
    pub successful_requests: u64,
    /// Calls that failed or were rejected
    pub failed_requests: u64,
    /// Sum of call durations
    pub total_response_time_ms: u64,
    /// Sum of reported tokens
    pub total_tokens_used: u64,
    /// Failure counts keyed by error kind
    pub errors_by_type: BTreeMap<String, u64>,
}

impl ProviderMetrics {
    /// Creates empty counters for a provider
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            ..Self::default()
        }
    }

    /// Mean call duration, zero before the first call
    pub fn average_response_time_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_response_time_ms as f64 / self.total_requests as f64
        }
    }

    /// Fraction of calls that succeeded, zero before the first call
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Collects and stores metrics for analysis
pub struct MetricsCollector {
    providers: Mutex<HashMap<String, ProviderMetrics>>,
    cache_hits: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new metrics collector
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(HashMap::new()),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Records a call that produced an accepted response
    pub fn record_success(&self, provider: &str, response_time_ms: u64, tokens_used: u64) {
        let mut providers = self.providers.lock_ignore_poison();
        let metrics = providers
            .entry(provider.to_owned())
            .or_insert_with(|| ProviderMetrics::new(provider));
        metrics.total_requests += 1;
        metrics.successful_requests += 1;
        metrics.total_response_time_ms += response_time_ms;
        metrics.total_tokens_used += tokens_used;
    }

    /// Records a call that failed, bucketed by error kind
    pub fn record_failure(&self, provider: &str, response_time_ms: u64, error_kind: &str) {
        let mut providers = self.providers.lock_ignore_poison();
        let metrics = providers
            .entry(provider.to_owned())
            .or_insert_with(|| ProviderMetrics::new(provider));
        metrics.total_requests += 1;
        metrics.failed_requests += 1;
        metrics.total_response_time_ms += response_time_ms;
        *metrics
            .errors_by_type
            .entry(error_kind.to_owned())
            .or_insert(0) += 1;
    }

    /// Records a request answered from cache
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests answered from cache
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Counters for one provider
    pub fn provider(&self, provider: &str) -> Option<ProviderMetrics> {
        self.providers.lock_ignore_poison().get(provider).cloned()
    }

    /// Counters for every provider, ordered by name
    pub fn all(&self) -> Vec<ProviderMetrics> {
        let mut all: Vec<ProviderMetrics> =
            self.providers.lock_ignore_poison().values().cloned().collect();
        all.sort_by(|left, right| left.provider_name.cmp(&right.provider_name));
        all
    }

    /// Drops the counters for one provider
    pub fn remove(&self, provider: &str) {
        self.providers.lock_ignore_poison().remove(provider);
    }

    /// Clears all metrics
    pub fn clear(&self) {
        self.providers.lock_ignore_poison().clear();
        self.cache_hits.store(0, Ordering::Relaxed);
    }

    /// Returns whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.providers.lock_ignore_poison().is_empty() && self.cache_hits() == 0
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
