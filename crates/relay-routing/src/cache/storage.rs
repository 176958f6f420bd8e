//! Cache storage implementation using a mutex-guarded `HashMap`.
//!
//! Entries expire independently `ttl` after insertion. Expired entries are
//! evicted lazily on read and by a periodic background sweep.

use super::key::fingerprint;
use chrono::{DateTime, TimeDelta, Utc};
use relay_core::{CacheConfig, Clock, IgnoreLock as _, Request, Response, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// A cached response with its insertion time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored response, always with `cached == false`
    pub response: Response,
    /// When this entry was stored
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Checks if this cache entry has outlived the given TTL
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now.signed_duration_since(self.stored_at) > ttl
    }
}

/// Hit/miss counters and current size of the cache
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// `hits / (hits + misses)`, zero before the first lookup
    pub hit_rate: f64,
    /// Number of stored entries, including ones not yet swept
    pub size: usize,
}

/// In-memory response cache with TTL-based expiration
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Creates a new response cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache that reads time from the given clock
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = TimeDelta::from_std(config.ttl()).unwrap_or(TimeDelta::MAX);
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache configuration in effect
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets a cached copy of the response if it exists and hasn't expired
    ///
    /// The returned copy has `cached == true`; the stored entry is untouched.
    pub fn get(&self, request: &Request) -> Option<Response> {
        if !self.config.enabled {
            return None;
        }

        let key = fingerprint(request);
        let now = self.clock.now();
        let found = {
            let mut entries = self.entries.lock_ignore_poison();
            match entries.get(&key) {
                Some(entry) if entry.is_expired(now, self.ttl) => {
                    entries.remove(&key);
                    None
                }
                Some(entry) => Some(entry.response.as_cached()),
                None => None,
            }
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Stores a response in the cache
    ///
    /// Concurrent writers for the same request race; the last write wins.
    pub fn set(&self, request: &Request, response: &Response) {
        if !self.config.enabled {
            return;
        }

        let mut stored = response.clone();
        stored.cached = false;
        let entry = CacheEntry {
            response: stored,
            stored_at: self.clock.now(),
        };

        let key = fingerprint(request);
        self.entries.lock_ignore_poison().insert(key, entry);
    }

    /// Removes the entry for a request, returning whether one existed
    pub fn invalidate(&self, request: &Request) -> bool {
        let key = fingerprint(request);
        self.entries.lock_ignore_poison().remove(&key).is_some()
    }

    /// Clears all expired entries from the cache, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock_ignore_poison();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        before - entries.len()
    }

    /// Clears all entries from the cache
    pub fn clear(&self) {
        self.entries.lock_ignore_poison().clear();
    }

    /// Resets the hit and miss counters
    pub fn reset_metrics(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Returns the number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.lock_ignore_poison().len()
    }

    /// Returns whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics
    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheMetrics {
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            size: self.len(),
        }
    }

    /// Spawns the periodic sweep on the current tokio runtime.
    ///
    /// The task runs until `shutdown` is cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = if self.config.sweep_interval().is_zero() {
            CacheConfig::default().sweep_interval()
        } else {
            self.config.sweep_interval()
        };
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            tracing::debug!("Cache sweep evicted {removed} expired entries");
                        }
                    }
                }
            }
            tracing::debug!("Cache sweeper stopped");
        })
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
