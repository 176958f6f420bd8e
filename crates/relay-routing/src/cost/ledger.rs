//! Daily spend tracking with per-provider budgets.

use chrono::{DateTime, Utc};
use relay_core::{Clock, CostConfig, CostLimit, IgnoreLock as _, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Slack for floating point accumulation when comparing against a limit.
const LIMIT_EPSILON: f64 = 1e-9;

/// Format of the day key, in UTC.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One recorded spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Provider that was paid
    pub provider: String,
    /// UTC day the spend counts against (`YYYY-MM-DD`)
    pub date: String,
    /// Cost predicted before the call
    pub estimated_cost: f64,
    /// Cost computed from the reported usage
    pub actual_cost: f64,
    /// Tokens the cost was computed from
    pub tokens_used: u64,
    /// When the spend was recorded
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    entries: Vec<CostEntry>,
    totals: HashMap<String, BTreeMap<String, f64>>,
    limits: HashMap<String, CostLimit>,
    alerted: HashSet<(String, String)>,
    blocked: HashSet<(String, String)>,
}

impl LedgerState {
    fn spent(&self, provider: &str, date: &str) -> f64 {
        self.totals
            .get(provider)
            .and_then(|days| days.get(date))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Append-only cost log with a per-provider, per-day running total
pub struct CostLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
}

impl CostLedger {
    /// Creates a ledger with the configured limits
    pub fn new(config: &CostConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a ledger that reads time from the given clock
    pub fn with_clock(config: &CostConfig, clock: Arc<dyn Clock>) -> Self {
        let state = LedgerState {
            limits: config
                .limits
                .iter()
                .map(|(provider, limit)| (provider.clone(), *limit))
                .collect(),
            ..LedgerState::default()
        };
        Self {
            state: Mutex::new(state),
            clock,
        }
    }

    /// Today's day key in UTC
    pub fn today(&self) -> String {
        self.clock.now().format(DATE_FORMAT).to_string()
    }

    /// Sets or replaces the limits for a provider
    pub fn set_limit(&self, provider: &str, limit: CostLimit) {
        self.state
            .lock_ignore_poison()
            .limits
            .insert(provider.to_owned(), limit);
    }

    /// Limits configured for a provider
    pub fn limit(&self, provider: &str) -> Option<CostLimit> {
        self.state.lock_ignore_poison().limits.get(provider).copied()
    }

    /// Appends a spend dated today and updates the running total.
    ///
    /// Crossing the alert threshold or the daily limit logs a warning once
    /// per provider and day.
    pub fn record_cost(
        &self,
        provider: &str,
        estimated_cost: f64,
        actual_cost: f64,
        tokens_used: u64,
    ) -> CostEntry {
        let now = self.clock.now();
        let date = now.format(DATE_FORMAT).to_string();
        let entry = CostEntry {
            provider: provider.to_owned(),
            date: date.clone(),
            estimated_cost,
            actual_cost,
            tokens_used,
            timestamp: now,
        };

        let mut state = self.state.lock_ignore_poison();
        state.entries.push(entry.clone());

        let total = {
            let day_total = state
                .totals
                .entry(provider.to_owned())
                .or_default()
                .entry(date.clone())
                .or_insert(0.0);
            *day_total += actual_cost.max(0.0);
            *day_total
        };

        let limit = state.limits.get(provider).copied().unwrap_or_default();
        let key = (provider.to_owned(), date);
        if let Some(threshold) = limit.alert_threshold
            && total >= threshold
            && state.alerted.insert(key.clone())
        {
            tracing::warn!(
                "Provider {provider} spend ${total:.4} crossed alert threshold ${threshold:.4}"
            );
        }
        if let Some(daily_limit) = limit.daily_limit
            && total + LIMIT_EPSILON >= daily_limit
            && state.blocked.insert(key)
        {
            tracing::warn!(
                "Provider {provider} reached its daily limit ${daily_limit:.4} (spent ${total:.4})"
            );
        }

        entry
    }

    /// Whether a request with the given estimate fits in today's budget.
    ///
    /// The check is "would this push us over", so spend may reach the
    /// limit exactly.
    pub fn can_make_request(&self, provider: &str, estimated_cost: f64) -> bool {
        let date = self.today();
        let state = self.state.lock_ignore_poison();
        match state.limits.get(provider).and_then(|limit| limit.daily_limit) {
            None => true,
            Some(daily_limit) => {
                state.spent(provider, &date) + estimated_cost <= daily_limit + LIMIT_EPSILON
            }
        }
    }

    /// Cumulative spend for a provider today
    pub fn spent_today(&self, provider: &str) -> f64 {
        let date = self.today();
        self.state.lock_ignore_poison().spent(provider, &date)
    }

    /// Cumulative spend across every provider today
    pub fn total_today(&self) -> f64 {
        let date = self.today();
        self.state
            .lock_ignore_poison()
            .totals
            .values()
            .filter_map(|days| days.get(&date))
            .fold(0.0, |total, spent| total + spent)
    }

    /// Budget left today, `None` when the provider has no daily limit
    pub fn remaining_today(&self, provider: &str) -> Option<f64> {
        let date = self.today();
        let state = self.state.lock_ignore_poison();
        state
            .limits
            .get(provider)
            .and_then(|limit| limit.daily_limit)
            .map(|daily_limit| (daily_limit - state.spent(provider, &date)).max(0.0))
    }

    /// Every recorded entry, oldest first
    pub fn entries(&self) -> Vec<CostEntry> {
        self.state.lock_ignore_poison().entries.clone()
    }

    /// Running totals as `provider -> date -> cost`
    pub fn daily_totals(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.state
            .lock_ignore_poison()
            .totals
            .iter()
            .map(|(provider, days)| (provider.clone(), days.clone()))
            .collect()
    }

    /// Drops all recorded spend for a provider; limits are kept
    pub fn remove_provider(&self, provider: &str) {
        let mut state = self.state.lock_ignore_poison();
        state.entries.retain(|entry| entry.provider != provider);
        state.totals.remove(provider);
        state.alerted.retain(|(name, _)| name != provider);
        state.blocked.retain(|(name, _)| name != provider);
    }

    /// Drops all recorded spend; limits are kept
    pub fn reset(&self) {
        let mut state = self.state.lock_ignore_poison();
        state.entries.clear();
        state.totals.clear();
        state.alerted.clear();
        state.blocked.clear();
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new(&CostConfig::default())
    }
}
