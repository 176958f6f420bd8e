//! Response caching keyed by request fingerprint.
//!
//! This module provides caching infrastructure for provider responses to
//! avoid repeated upstream calls for semantically identical requests.

/// Request fingerprinting
pub mod key;
/// Cache storage implementation
pub mod storage;

pub use key::fingerprint;
pub use storage::{CacheEntry, CacheMetrics, ResponseCache};
