//! Provider registry keyed by provider name.
//!
//! Providers are registered once and shared behind `Arc` for every request.

use crate::health::HealthTracker;
use chrono::{DateTime, Utc};
use relay_core::{IgnoreRwLock as _, Provider};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry that maps provider names to provider instances.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a provider under its descriptor name, returning the one it replaced
    pub fn insert(&self, provider: Arc<dyn Provider>) -> Option<Arc<dyn Provider>> {
        let name = provider.name().to_owned();
        self.providers.write_ignore_poison().insert(name, provider)
    }

    /// Removes a provider by name
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.write_ignore_poison().remove(name)
    }

    /// Looks up a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.read_ignore_poison().get(name).cloned()
    }

    /// Whether a provider with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.providers.read_ignore_poison().contains_key(name)
    }

    /// All registered providers, sorted by priority then name
    pub fn list(&self) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<Arc<dyn Provider>> =
            self.providers.read_ignore_poison().values().cloned().collect();
        providers.sort_by(|left, right| {
            left.descriptor()
                .priority
                .cmp(&right.descriptor().priority)
                .then_with(|| left.name().cmp(right.name()))
        });
        providers
    }

    /// Providers that may be selected at `now`, in priority order.
    ///
    /// A provider qualifies when it reports itself available and the health
    /// tracker lets it through. The registry lock is released before the
    /// tracker is consulted.
    pub fn eligible(&self, health: &HealthTracker, now: DateTime<Utc>) -> Vec<Arc<dyn Provider>> {
        self.list()
            .into_iter()
            .filter(|provider| provider.is_available() && health.eligible(provider.name(), now))
            .collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.read_ignore_poison().len()
    }

    /// Whether no providers are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
