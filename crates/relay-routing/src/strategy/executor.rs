//! Dispatch strategies over a prioritized provider list.
//!
//! The executor owns no provider state of its own. It reads budgets from the
//! [`CostLedger`], and after every call it records the outcome in the
//! [`HealthTracker`], [`MetricsCollector`], [`CostLedger`] and
//! [`ResponseCache`]. No lock is held while a provider call is in flight.

use super::scoring::{comparison_score, estimate_tokens, quality_score};
use crate::cache::ResponseCache;
use crate::cost::CostLedger;
use crate::error::{AttemptFailure, FailureReason, Result, RoutingError};
use crate::health::HealthTracker;
use crate::metrics::MetricsCollector;
use futures::future::join_all;
use relay_core::{Provider, ProviderError, ProviderResult, Request, Response, Strategy};
use std::sync::Arc;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

/// Error kind recorded in metrics when a response fails the quality gate.
const QUALITY_ERROR_KIND: &str = "quality_below_threshold";

/// Result of one provider call together with how long it took.
struct CallOutcome {
    result: ProviderResult<Response>,
    elapsed_ms: u64,
}

/// Runs the four dispatch strategies.
pub struct StrategyExecutor {
    cache: Arc<ResponseCache>,
    health: Arc<HealthTracker>,
    cost: Arc<CostLedger>,
    metrics: Arc<MetricsCollector>,
    quality_threshold: f64,
}

impl StrategyExecutor {
    /// Creates an executor that reports outcomes to the given components
    pub fn new(
        cache: Arc<ResponseCache>,
        health: Arc<HealthTracker>,
        cost: Arc<CostLedger>,
        metrics: Arc<MetricsCollector>,
        quality_threshold: f64,
    ) -> Self {
        Self {
            cache,
            health,
            cost,
            metrics,
            quality_threshold,
        }
    }

    /// Minimum quality score accepted by the cost-optimized strategy
    pub fn quality_threshold(&self) -> f64 {
        self.quality_threshold
    }

    /// Obtains a single response using `strategy`.
    ///
    /// `candidates` must already be filtered to eligible providers and sorted
    /// by ascending priority.
    ///
    /// # Errors
    /// Returns `NoProvidersAvailable` for an empty candidate list. Primary-only
    /// surfaces the first provider's error or `CostLimitExceeded`; the other
    /// strategies return `AllProvidersFailed` listing every attempt.
    pub async fn execute(
        &self,
        strategy: Strategy,
        candidates: &[Arc<dyn Provider>],
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        if candidates.is_empty() {
            return Err(RoutingError::NoProvidersAvailable);
        }

        tracing::debug!(
            "Executing {strategy} over {} candidate providers",
            candidates.len()
        );

        match strategy {
            Strategy::PrimaryOnly => self.primary_only(candidates, request, cancel).await,
            Strategy::FallbackChain => self.chain(candidates, request, None, cancel).await,
            Strategy::ParallelComparison => {
                self.parallel_comparison(candidates, request, cancel).await
            }
            Strategy::CostOptimized => {
                let estimated_tokens = estimate_tokens(request);
                let mut ordered = candidates.to_vec();
                // Stable sort keeps priority order among equally priced providers.
                ordered.sort_by(|left, right| {
                    left.estimate_cost(estimated_tokens)
                        .total_cmp(&right.estimate_cost(estimated_tokens))
                });
                self.chain(&ordered, request, Some(self.quality_threshold), cancel)
                    .await
            }
        }
    }

    async fn primary_only(
        &self,
        candidates: &[Arc<dyn Provider>],
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let Some(provider) = candidates.first() else {
            return Err(RoutingError::NoProvidersAvailable);
        };
        let estimated_tokens = estimate_tokens(request);
        let estimated_cost = provider.estimate_cost(estimated_tokens);

        if let Some(remaining) = self.exceeded_budget(provider.name(), estimated_cost) {
            return Err(RoutingError::CostLimitExceeded {
                provider: provider.name().to_owned(),
                estimated: estimated_cost,
                remaining,
            });
        }

        let outcome = self.call(provider.as_ref(), request, cancel).await;
        match outcome.result {
            Ok(response) => {
                self.record_success(
                    provider.as_ref(),
                    &response,
                    estimated_tokens,
                    outcome.elapsed_ms,
                );
                self.cache.set(request, &response);
                Ok(response)
            }
            Err(error) => {
                self.record_failure(provider.name(), &error, outcome.elapsed_ms);
                Err(RoutingError::Provider {
                    provider: provider.name().to_owned(),
                    source: error,
                })
            }
        }
    }

    /// Tries providers one at a time in the given order.
    ///
    /// With a quality gate, a response scoring below it is treated as a
    /// tracked failure and the next provider is tried.
    async fn chain(
        &self,
        ordered: &[Arc<dyn Provider>],
        request: &Request,
        quality_gate: Option<f64>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let estimated_tokens = estimate_tokens(request);
        let mut attempts = Vec::with_capacity(ordered.len());

        for provider in ordered {
            let name = provider.name();
            let estimated_cost = provider.estimate_cost(estimated_tokens);

            if let Some(remaining) = self.exceeded_budget(name, estimated_cost) {
                let reason = FailureReason::CostLimitExceeded {
                    estimated: estimated_cost,
                    remaining,
                };
                tracing::debug!("Skipping {name}: {reason}");
                attempts.push(AttemptFailure::new(name, reason));
                continue;
            }

            tracing::debug!("Attempting provider {name}");
            let outcome = self.call(provider.as_ref(), request, cancel).await;
            let response = match outcome.result {
                Ok(response) => response,
                Err(error) => {
                    self.record_failure(name, &error, outcome.elapsed_ms);
                    let cancelled = matches!(error, ProviderError::Cancelled);
                    attempts.push(AttemptFailure::new(name, FailureReason::Provider(error)));
                    if cancelled {
                        break;
                    }
                    continue;
                }
            };

            if let Some(threshold) = quality_gate {
                let score = quality_score(&response);
                if score < threshold {
                    tracing::warn!(
                        "Provider {name} response rejected: quality {score:.2} < {threshold:.2}"
                    );
                    // The call was made and billed even though the answer is discarded.
                    self.record_spend(provider.as_ref(), &response, estimated_tokens);
                    self.metrics
                        .record_failure(name, outcome.elapsed_ms, QUALITY_ERROR_KIND);
                    self.health.record_failure(
                        name,
                        &format!("quality score {score:.2} below {threshold:.2}"),
                    );
                    attempts.push(AttemptFailure::new(
                        name,
                        FailureReason::QualityBelowThreshold { score, threshold },
                    ));
                    continue;
                }
            }

            self.record_success(
                provider.as_ref(),
                &response,
                estimated_tokens,
                outcome.elapsed_ms,
            );
            self.cache.set(request, &response);
            tracing::info!("Request served by {name} after {} failed attempts", attempts.len());
            return Ok(response);
        }

        Err(RoutingError::AllProvidersFailed { attempts })
    }

    /// Calls every candidate concurrently and keeps the best-scoring response.
    ///
    /// Losing providers that answered successfully are still counted as
    /// successes in health and metrics, and their spend is recorded.
    async fn parallel_comparison(
        &self,
        candidates: &[Arc<dyn Provider>],
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let estimated_tokens = estimate_tokens(request);
        let outcomes = join_all(
            candidates
                .iter()
                .map(|provider| self.call(provider.as_ref(), request, cancel)),
        )
        .await;

        let mut attempts = Vec::new();
        let mut successes: Vec<(Arc<dyn Provider>, Response, u64)> = Vec::new();
        for (provider, outcome) in candidates.iter().zip(outcomes) {
            match outcome.result {
                Ok(response) => {
                    successes.push((Arc::clone(provider), response, outcome.elapsed_ms));
                }
                Err(error) => {
                    self.record_failure(provider.name(), &error, outcome.elapsed_ms);
                    attempts.push(AttemptFailure::new(
                        provider.name(),
                        FailureReason::Provider(error),
                    ));
                }
            }
        }

        let mut winner: Option<(usize, f64)> = None;
        for (index, (provider, response, _)) in successes.iter().enumerate() {
            let score = comparison_score(response, provider.descriptor().priority);
            // Strictly greater, so ties go to the earlier (more preferred) provider.
            if winner.is_none_or(|(_, best)| score > best) {
                winner = Some((index, score));
            }
        }

        let Some((winner_index, winner_score)) = winner else {
            return Err(RoutingError::AllProvidersFailed { attempts });
        };

        for (provider, response, elapsed_ms) in &successes {
            self.record_success(provider.as_ref(), response, estimated_tokens, *elapsed_ms);
        }

        let (provider, response, _) = successes.swap_remove(winner_index);
        tracing::info!(
            "Parallel comparison picked {} (score {winner_score:.2}) from {} responses",
            provider.name(),
            successes.len() + 1
        );
        self.cache.set(request, &response);
        Ok(response)
    }

    /// Remaining budget when `estimated_cost` does not fit today, `None` when it does
    fn exceeded_budget(&self, provider: &str, estimated_cost: f64) -> Option<f64> {
        if self.cost.can_make_request(provider, estimated_cost) {
            None
        } else {
            Some(self.cost.remaining_today(provider).unwrap_or(0.0))
        }
    }

    /// Calls a provider under its timeout and the caller's cancellation token.
    ///
    /// Responses that fail the provider's own validation come back as
    /// `ValidationFailed`.
    async fn call(
        &self,
        provider: &dyn Provider,
        request: &Request,
        cancel: &CancellationToken,
    ) -> CallOutcome {
        let limit = provider.descriptor().timeout();
        let started = Instant::now();

        let result = tokio::select! {
            () = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = timeout(limit, provider.generate_response(request)) => match result {
                Ok(result) => result,
                Err(_elapsed) => Err(ProviderError::Timeout {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = result.and_then(|mut response| {
            if !provider.validate_response(&response) {
                return Err(ProviderError::ValidationFailed(format!(
                    "{} returned an empty or malformed response",
                    provider.name()
                )));
            }
            response.cached = false;
            response.response_time_ms = elapsed_ms;
            Ok(response)
        });

        CallOutcome { result, elapsed_ms }
    }

    fn record_success(
        &self,
        provider: &dyn Provider,
        response: &Response,
        estimated_tokens: u64,
        elapsed_ms: u64,
    ) {
        let name = provider.name();
        self.health.record_success(name);
        self.metrics
            .record_success(name, elapsed_ms, response.tokens_used.unwrap_or(0));
        self.record_spend(provider, response, estimated_tokens);
    }

    /// Records a cost entry using reported tokens, or the estimate when absent
    fn record_spend(&self, provider: &dyn Provider, response: &Response, estimated_tokens: u64) {
        let tokens = response.tokens_used.unwrap_or(estimated_tokens);
        self.cost.record_cost(
            provider.name(),
            provider.estimate_cost(estimated_tokens),
            provider.estimate_cost(tokens),
            tokens,
        );
    }

    fn record_failure(&self, provider: &str, error: &ProviderError, elapsed_ms: u64) {
        tracing::warn!("Provider {provider} failed: {error}");
        self.metrics.record_failure(provider, elapsed_ms, error.kind());
        // Caller cancellation says nothing about the provider's health.
        if !matches!(error, ProviderError::Cancelled) {
            self.health.record_failure(provider, &error.to_string());
        }
    }
}
