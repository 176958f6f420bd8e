//! Provider selection strategies and the heuristics they rely on.

/// Strategy execution against a candidate list
pub mod executor;
/// Pure scoring functions
pub mod scoring;

pub use executor::StrategyExecutor;
pub use relay_core::Strategy;
pub use scoring::{comparison_score, estimate_tokens, quality_score};
