//! Core types and traits for the relay provider orchestrator.
//!
//! This crate provides the request/response data model, the provider contract,
//! the error taxonomy, and configuration shared by every other relay crate.

/// Time sources used for TTLs, cooldowns, and daily budgets.
pub mod clock;
/// Configuration loading and defaults.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Lock helpers that ignore poisoning.
pub mod sync;
/// Trait definitions for upstream providers.
pub mod traits;
/// Core data types for requests, responses, and provider descriptors.
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheConfig, CostConfig, CostLimit, HealthConfig, RelayConfig, Strategy, StrategyConfig,
};
pub use error::{CoreError, ProviderError, ProviderResult, Result};
pub use sync::{IgnoreLock, IgnoreRwLock};
pub use traits::Provider;
pub use types::{Metadata, ProviderDescriptor, Request, Response};
