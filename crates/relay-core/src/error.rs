use core::result::Result as CoreResult;
use core::time::Duration;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlDeError;
use toml::ser::Error as TomlSerError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, CoreError>;

/// Result type returned by provider calls.
pub type ProviderResult<T> = CoreResult<T, ProviderError>;

/// Errors that can occur in the core library.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] TomlDeError),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] TomlSerError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request cannot be dispatched as given.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

/// Failure kinds a single provider call can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The call did not finish within the provider's timeout.
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that was exceeded
        timeout_ms: u64,
    },

    /// The upstream rejected the call because of rate limiting.
    #[error("rate limited{}", retry_after_suffix(.retry_after))]
    RateLimited {
        /// Optional hint for when the upstream accepts calls again
        retry_after: Option<Duration>,
    },

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider answered but the payload was malformed or empty.
    #[error("response validation failed: {0}")]
    ValidationFailed(String),

    /// The provider is not reachable or not configured.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// Any other provider failure.
    #[error("{0}")]
    Other(String),
}

/// Renders the optional retry hint of a rate-limit error.
fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|delay| format!(" (retry after {}ms)", delay.as_millis()))
        .unwrap_or_default()
}

impl ProviderError {
    /// Determines whether the strategy may move on to another provider.
    ///
    /// Authentication and cancellation are configuration or caller problems
    /// and will not be fixed by trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::ValidationFailed(_)
                | Self::Unavailable(_)
                | Self::Other(_)
        )
    }

    /// Stable label used when bucketing errors in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::AuthFailed(_) => "auth_failed",
            Self::ValidationFailed(_) => "validation_failed",
            Self::Unavailable(_) => "unavailable",
            Self::Cancelled => "cancelled",
            Self::Other(_) => "other",
        }
    }
}
