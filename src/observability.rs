//! Observability: process-lifetime counters and metric hooks.
//!
//! Two concerns live here:
//!
//! - **Counters ([`CacheStats`])**: hits, misses, sets, deletes, and errors,
//!   always on. A point-in-time [`StatsSnapshot`] is what a health or
//!   diagnostics endpoint serializes.
//! - **Hooks ([`CacheMetrics`])**: optional callbacks with per-operation
//!   timing, for forwarding into an external metrics system.
//!
//! ```ignore
//! use cache_coord::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("cache_hits").increment(1);
//!     }
//!     // ... implement other methods
//! }
//!
//! // let cache = CacheService::new(config).with_metrics(Box::new(PrometheusMetrics));
//! ```
//!
//! Counters are never persisted and start at zero on every process start.

use crate::backend::BackendKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a cache delete operation.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record an error that was degraded instead of surfaced.
    ///
    /// The service already logs the failure at `warn`; this hook only traces.
    fn record_error(&self, key: &str, error: &str) {
        debug!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Process-lifetime operation counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `n` deleted keys (pattern deletes add more than one).
    pub fn record_deletes(&self, n: u64) {
        self.deletes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// hits / (hits + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits(), self.misses())
    }

    /// Capture the counters together with backend identity.
    pub fn snapshot(
        &self,
        backend: Option<BackendKind>,
        distributed: bool,
        entries: Option<usize>,
    ) -> StatsSnapshot {
        let hits = self.hits();
        let misses = self.misses();

        StatsSnapshot {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses),
            backend,
            distributed,
            entries,
        }
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Point-in-time view of the cache for diagnostics endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub hit_rate: f64,
    /// `None` until the service has been initialised.
    pub backend: Option<BackendKind>,
    /// `false` in local mode: locks and rate limits are per-process.
    pub distributed: bool,
    /// Live entries, local mode only.
    pub entries: Option<usize>,
}
