//! Provider implementations for the relay orchestrator.
//!
//! Vendor HTTP clients live outside this workspace; this crate ships the
//! null-object provider used as the last resort in a chain and in tests.

/// Scriptable mock provider.
pub mod mock;

pub use mock::MockProvider;
