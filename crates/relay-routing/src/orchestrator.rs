use core::time::Duration;
use std::sync::{Arc, Mutex, RwLock};

use relay_core::{
    Clock, IgnoreLock as _, IgnoreRwLock as _, Provider, ProviderDescriptor, RelayConfig, Request,
    Response, Strategy, SystemClock,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    CostLedger, HealthTracker, MetricsCollector, MetricsReport, ProviderHealth, ProviderRegistry,
    ResponseCache, Result, RoutingError, StatisticsReport, StrategyExecutor,
};

/// Public entry point that routes requests across registered providers.
///
/// Every call goes cache first, then through the active strategy. Health,
/// cost and metrics are updated from the outcome.
pub struct ProviderManager {
    config: RelayConfig,
    registry: ProviderRegistry,
    strategy: RwLock<Strategy>,
    cache: Arc<ResponseCache>,
    health: Arc<HealthTracker>,
    cost: Arc<CostLedger>,
    metrics: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ProviderManager {
    /// Creates a manager with components built from `config`.
    ///
    /// Providers are not registered from the config; callers construct them
    /// and pass them to [`Self::register_provider`].
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RelayConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            registry: ProviderRegistry::new(),
            strategy: RwLock::new(config.strategy.strategy),
            cache: Arc::new(ResponseCache::with_clock(
                config.cache.clone(),
                Arc::clone(&clock),
            )),
            health: Arc::new(HealthTracker::with_clock(
                config.health.clone(),
                Arc::clone(&clock),
            )),
            cost: Arc::new(CostLedger::with_clock(&config.cost, Arc::clone(&clock))),
            metrics: Arc::new(MetricsCollector::new()),
            clock,
            shutdown: CancellationToken::new(),
            sweeper: Mutex::new(None),
            config,
        }
    }

    /// Replaces the time source and rebuilds the cache, health tracker and
    /// cost ledger around it.
    ///
    /// Call before injecting any of those components.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = Arc::new(ResponseCache::with_clock(
            self.config.cache.clone(),
            Arc::clone(&clock),
        ));
        self.health = Arc::new(HealthTracker::with_clock(
            self.config.health.clone(),
            Arc::clone(&clock),
        ));
        self.cost = Arc::new(CostLedger::with_clock(&self.config.cost, Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    /// Sets a custom response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets a custom health tracker.
    #[must_use]
    pub fn with_health_tracker(mut self, health: Arc<HealthTracker>) -> Self {
        self.health = health;
        self
    }

    /// Sets a custom cost ledger.
    #[must_use]
    pub fn with_cost_ledger(mut self, cost: Arc<CostLedger>) -> Self {
        self.cost = cost;
        self
    }

    /// Sets a custom metrics collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Generates a response for `request`.
    ///
    /// # Errors
    /// Returns an error if the request is invalid, nothing is eligible, or
    /// the active strategy could not obtain a response.
    pub async fn generate(&self, request: &Request) -> Result<Response> {
        self.generate_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Generates a response, abandoning in-flight provider calls when
    /// `cancel` fires.
    ///
    /// # Errors
    /// Same as [`Self::generate`]; cancelled calls are reported as
    /// `Cancelled` provider failures.
    pub async fn generate_with_cancel(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        if self.shutdown.is_cancelled() {
            return Err(RoutingError::ShutDown);
        }
        request.validate()?;

        if let Some(response) = self.cache.get(request) {
            self.metrics.record_cache_hit();
            tracing::debug!("Cache hit for request served by {}", response.provider_name);
            return Ok(response);
        }

        let candidates = self.registry.eligible(&self.health, self.clock.now());
        let strategy = self.strategy();
        tracing::debug!(
            "Routing request with {strategy} across {} eligible providers",
            candidates.len()
        );

        self.executor()
            .execute(strategy, &candidates, request, cancel)
            .await
    }

    fn executor(&self) -> StrategyExecutor {
        StrategyExecutor::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.health),
            Arc::clone(&self.cost),
            Arc::clone(&self.metrics),
            self.config.strategy.quality_threshold,
        )
    }

    /// Registers a provider under its descriptor name.
    ///
    /// Registering a name that already exists replaces the old provider and
    /// resets its health and metrics.
    ///
    /// # Errors
    /// Returns an error if the provider's descriptor is invalid.
    pub fn register_provider(&self, provider: Arc<dyn Provider>) -> Result<()> {
        provider.descriptor().validate()?;
        let name = provider.name().to_owned();
        let priority = provider.descriptor().priority;

        if self.registry.insert(provider).is_some() {
            tracing::info!("Replaced provider {name} (priority {priority})");
        } else {
            tracing::info!("Registered provider {name} (priority {priority})");
        }
        self.health.reset(&name);
        self.metrics.remove(&name);
        Ok(())
    }

    /// Removes a provider and purges its health, metrics and cost history.
    ///
    /// # Errors
    /// Returns `ProviderNotFound` if no provider has this name.
    pub fn unregister_provider(&self, name: &str) -> Result<Arc<dyn Provider>> {
        let provider = self
            .registry
            .remove(name)
            .ok_or_else(|| RoutingError::ProviderNotFound(name.to_owned()))?;
        self.health.remove(name);
        self.metrics.remove(name);
        self.cost.remove_provider(name);
        tracing::info!("Unregistered provider {name}");
        Ok(provider)
    }

    /// Looks up a registered provider
    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.registry.get(name)
    }

    /// Descriptors of every registered provider, in priority order
    pub fn list_providers(&self) -> Vec<ProviderDescriptor> {
        self.registry
            .list()
            .iter()
            .map(|provider| provider.descriptor().clone())
            .collect()
    }

    /// Switches the strategy used by subsequent requests
    pub fn set_strategy(&self, strategy: Strategy) {
        *self.strategy.write_ignore_poison() = strategy;
        tracing::info!("Routing strategy set to {strategy}");
    }

    /// Strategy currently in use
    pub fn strategy(&self) -> Strategy {
        *self.strategy.read_ignore_poison()
    }

    /// Takes a provider out of rotation, optionally for a limited time.
    ///
    /// # Errors
    /// Returns `ProviderNotFound` if no provider has this name.
    pub fn disable_provider(&self, name: &str, cooldown: Option<Duration>) -> Result<()> {
        self.ensure_registered(name)?;
        self.health.disable(name, cooldown);
        Ok(())
    }

    /// Puts a provider back in rotation.
    ///
    /// # Errors
    /// Returns `ProviderNotFound` if no provider has this name.
    pub fn enable_provider(&self, name: &str) -> Result<()> {
        self.ensure_registered(name)?;
        self.health.enable(name);
        Ok(())
    }

    fn ensure_registered(&self, name: &str) -> Result<()> {
        if self.registry.contains(name) {
            Ok(())
        } else {
            Err(RoutingError::ProviderNotFound(name.to_owned()))
        }
    }

    /// Health snapshot for one provider
    pub fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        self.health.snapshot(name)
    }

    /// Response cache in use
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Health tracker in use
    pub fn health_tracker(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    /// Cost ledger in use
    pub fn cost_ledger(&self) -> &Arc<CostLedger> {
        &self.cost
    }

    /// Metrics collector in use
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Aggregate statistics across all components
    pub fn metrics_report(&self) -> StatisticsReport {
        MetricsReport::generate(&self.metrics, self.cache.metrics(), &self.cost)
    }

    /// Clears metrics, cache counters, recorded spend and health history.
    ///
    /// Cached responses are kept. Operator disables are lifted.
    pub fn reset_statistics(&self) {
        self.metrics.clear();
        self.cache.reset_metrics();
        self.cost.reset();
        for provider in self.registry.list() {
            self.health.reset(provider.name());
        }
        tracing::info!("Statistics reset");
    }

    /// Starts the background cache sweep.
    ///
    /// Does nothing when the cache is disabled, the sweep is already running,
    /// or no Tokio runtime is available.
    pub fn start(&self) {
        if !self.cache.config().enabled || self.shutdown.is_cancelled() {
            return;
        }
        if Handle::try_current().is_err() {
            tracing::warn!("No Tokio runtime, cache sweeping not started");
            return;
        }

        let mut sweeper = self.sweeper.lock_ignore_poison();
        if sweeper.is_none() {
            *sweeper = Some(self.cache.spawn_sweeper(self.shutdown.child_token()));
            tracing::debug!("Cache sweeper started");
        }
    }

    /// Stops background work and logs final statistics.
    ///
    /// Further calls to [`Self::generate`] fail with `ShutDown`.
    pub async fn shutdown(&self) -> StatisticsReport {
        self.shutdown.cancel();
        let sweeper = self.sweeper.lock_ignore_poison().take();
        if let Some(handle) = sweeper
            && let Err(error) = handle.await
        {
            tracing::warn!("Cache sweeper ended abnormally: {error}");
        }

        let report = self.metrics_report();
        match MetricsReport::format_report(&report) {
            Ok(summary) => tracing::info!("Final statistics:\n{summary}"),
            Err(error) => tracing::warn!("Failed to format final statistics: {error}"),
        }
        report
    }

    /// Whether [`Self::shutdown`] has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::build(RelayConfig::default())
    }
}
