//! Error types for the orchestration layer.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::result::Result as StdResult;

use relay_core::{CoreError, ProviderError};
use thiserror::Error;

/// Result type alias using `RoutingError`.
pub type Result<T> = StdResult<T, RoutingError>;

/// Why a single provider did not produce the winning response.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The provider call itself failed.
    Provider(ProviderError),
    /// The provider was skipped because the request would exceed its budget.
    CostLimitExceeded {
        /// Estimated cost of the request
        estimated: f64,
        /// Budget left for today
        remaining: f64,
    },
    /// The response was valid but scored below the quality threshold.
    QualityBelowThreshold {
        /// Score of the rejected response
        score: f64,
        /// Required minimum
        threshold: f64,
    },
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Provider(error) => write!(f, "{error}"),
            Self::CostLimitExceeded {
                estimated,
                remaining,
            } => write!(
                f,
                "skipped: estimated cost ${estimated:.4} exceeds remaining budget ${remaining:.4}"
            ),
            Self::QualityBelowThreshold { score, threshold } => {
                write!(f, "quality score {score:.2} below threshold {threshold:.2}")
            }
        }
    }
}

/// One provider attempt that did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    /// Provider that was attempted or skipped
    pub provider: String,
    /// What went wrong
    pub reason: FailureReason,
}

impl AttemptFailure {
    /// Creates a failure record.
    pub fn new(provider: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
        }
    }
}

/// Renders every attempt as `name: reason` pairs.
fn describe_attempts(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.provider, attempt.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types that can occur while orchestrating a request.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Error from relay-core
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Nothing eligible to try
    #[error("No providers available")]
    NoProvidersAvailable,

    /// The only candidate's budget for today is exhausted
    #[error(
        "Cost limit exceeded for {provider}: estimated ${estimated:.4}, remaining ${remaining:.4}"
    )]
    CostLimitExceeded {
        /// Provider whose budget would be exceeded
        provider: String,
        /// Estimated cost of the request
        estimated: f64,
        /// Budget left for today
        remaining: f64,
    },

    /// A single provider failed and the strategy does not absorb failures
    #[error("Provider {provider} failed: {source}")]
    Provider {
        /// Provider that failed
        provider: String,
        /// Underlying provider failure
        source: ProviderError,
    },

    /// Every eligible provider failed or was skipped
    #[error("All providers failed ({} attempts): {}", .attempts.len(), describe_attempts(.attempts))]
    AllProvidersFailed {
        /// Per-provider failure trail
        attempts: Vec<AttemptFailure>,
    },

    /// Administrative call referenced an unknown provider
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// The orchestrator has been shut down
    #[error("Orchestrator is shut down")]
    ShutDown,
}

impl RoutingError {
    /// Checks if this error is transient at the orchestration level.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { source, .. } => source.is_retryable(),
            Self::AllProvidersFailed { attempts } => attempts.iter().any(|attempt| {
                matches!(&attempt.reason, FailureReason::Provider(error) if error.is_retryable())
            }),
            _ => false,
        }
    }

    /// Per-provider failure trail, empty for non-aggregate errors.
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            Self::AllProvidersFailed { attempts } => attempts,
            _ => &[],
        }
    }
}
