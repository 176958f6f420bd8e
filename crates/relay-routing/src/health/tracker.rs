//! Per-provider failure streak tracking with automatic cooldown.
//!
//! A provider moves from active to disabled once its consecutive failures
//! reach the configured maximum. It becomes eligible again either when a
//! call to it succeeds or when selection notices that its cooldown elapsed.
//! There is no timer; state only changes when a result is recorded or when
//! [`HealthTracker::eligible`] is asked.

use chrono::{DateTime, TimeDelta, Utc};
use core::time::Duration;
use relay_core::{Clock, HealthConfig, IgnoreLock as _, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Health counters for one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Calls that succeeded
    pub success_count: u64,
    /// Calls that failed
    pub failure_count: u64,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Whether the provider is out of rotation
    pub disabled: bool,
    /// When an automatic or timed manual disable ends
    pub disabled_until: Option<DateTime<Utc>>,
    /// Whether the disable came from an operator
    pub manually_disabled: bool,
    /// Description of the most recent failure
    pub last_error: Option<String>,
}

/// Coarse state derived from [`ProviderHealth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    /// Selectable
    Active,
    /// Out of rotation until the given instant
    CoolingDown(DateTime<Utc>),
    /// Out of rotation until an operator enables it
    ManuallyDisabled,
}

impl ProviderHealth {
    /// State of the circuit at the given instant.
    pub fn state(&self, now: DateTime<Utc>) -> HealthState {
        match (self.disabled, self.disabled_until) {
            (false, _) => HealthState::Active,
            (true, Some(until)) if now >= until => HealthState::Active,
            (true, Some(until)) => HealthState::CoolingDown(until),
            (true, None) => HealthState::ManuallyDisabled,
        }
    }

    /// Fraction of recorded calls that succeeded, `1.0` with no history.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    fn clear_disable(&mut self) {
        self.disabled = false;
        self.disabled_until = None;
        self.manually_disabled = false;
    }
}

/// Circuit breaker over all registered providers
pub struct HealthTracker {
    states: Mutex<HashMap<String, ProviderHealth>>,
    config: HealthConfig,
    clock: Arc<dyn Clock>,
}

impl HealthTracker {
    /// Creates a tracker with the given thresholds
    pub fn new(config: HealthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a tracker that reads time from the given clock
    pub fn with_clock(config: HealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    /// Thresholds in effect
    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Starts tracking a provider with fresh counters, replacing any history
    pub fn reset(&self, provider: &str) {
        self.states
            .lock_ignore_poison()
            .insert(provider.to_owned(), ProviderHealth::default());
    }

    /// Stops tracking a provider
    pub fn remove(&self, provider: &str) -> Option<ProviderHealth> {
        self.states.lock_ignore_poison().remove(provider)
    }

    /// Whether the provider may be selected at `now`.
    ///
    /// A provider whose cooldown has elapsed is re-enabled here. Its
    /// consecutive failure count is kept, so one more failure trips it again
    /// straight away.
    pub fn eligible(&self, provider: &str, now: DateTime<Utc>) -> bool {
        let mut states = self.states.lock_ignore_poison();
        let Some(health) = states.get_mut(provider) else {
            return true;
        };

        match health.state(now) {
            HealthState::Active => {
                if health.disabled {
                    health.clear_disable();
                    tracing::info!("Provider {provider} cooldown elapsed, back in rotation");
                }
                true
            }
            HealthState::CoolingDown(_) | HealthState::ManuallyDisabled => false,
        }
    }

    /// Same as [`Self::eligible`] using the tracker's clock
    pub fn is_eligible(&self, provider: &str) -> bool {
        self.eligible(provider, self.clock.now())
    }

    /// Records a successful call.
    ///
    /// Success clears the failure streak and lifts an automatic disable
    /// immediately. Operator disables stay in place.
    pub fn record_success(&self, provider: &str) {
        let mut states = self.states.lock_ignore_poison();
        let health = states.entry(provider.to_owned()).or_default();
        health.success_count += 1;
        health.consecutive_failures = 0;
        if health.disabled && !health.manually_disabled {
            health.clear_disable();
            tracing::info!("Provider {provider} re-enabled after successful call");
        }
    }

    /// Records a failed call, returning `true` if this failure disabled the provider
    pub fn record_failure(&self, provider: &str, error: &str) -> bool {
        let now = self.clock.now();
        let cooldown = TimeDelta::from_std(self.config.cooldown()).unwrap_or(TimeDelta::MAX);

        let mut states = self.states.lock_ignore_poison();
        let health = states.entry(provider.to_owned()).or_default();
        health.failure_count += 1;
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_error = Some(error.to_owned());

        if health.consecutive_failures >= self.config.max_consecutive_failures && !health.disabled
        {
            let until = now.checked_add_signed(cooldown);
            health.disabled = true;
            health.disabled_until = until;
            health.manually_disabled = false;
            tracing::warn!(
                "Provider {provider} disabled after {} consecutive failures (until {})",
                health.consecutive_failures,
                until.map_or_else(|| "manual enable".to_owned(), |until| until.to_rfc3339())
            );
            return true;
        }
        false
    }

    /// Takes a provider out of rotation by operator request.
    ///
    /// With a cooldown the provider returns on its own once it elapses;
    /// without one it stays disabled until [`Self::enable`].
    pub fn disable(&self, provider: &str, cooldown: Option<Duration>) {
        let now = self.clock.now();
        let mut states = self.states.lock_ignore_poison();
        let health = states.entry(provider.to_owned()).or_default();
        health.disabled = true;
        health.manually_disabled = true;
        health.disabled_until = cooldown
            .and_then(|cooldown| TimeDelta::from_std(cooldown).ok())
            .and_then(|cooldown| now.checked_add_signed(cooldown));
        tracing::info!("Provider {provider} disabled by operator");
    }

    /// Puts a provider back in rotation and clears its failure streak
    pub fn enable(&self, provider: &str) {
        let mut states = self.states.lock_ignore_poison();
        let health = states.entry(provider.to_owned()).or_default();
        health.clear_disable();
        health.consecutive_failures = 0;
        tracing::info!("Provider {provider} enabled by operator");
    }

    /// Snapshot of one provider's counters
    pub fn snapshot(&self, provider: &str) -> Option<ProviderHealth> {
        self.states.lock_ignore_poison().get(provider).cloned()
    }

    /// Snapshot of every tracked provider, ordered by name
    pub fn all(&self) -> BTreeMap<String, ProviderHealth> {
        self.states
            .lock_ignore_poison()
            .iter()
            .map(|(name, health)| (name.clone(), health.clone()))
            .collect()
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
