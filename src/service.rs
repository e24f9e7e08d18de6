//! The cache service: backend selection and the key-value surface.
//!
//! [`CacheService`] is constructed by the application's composition root and
//! handed to consumers by clone (every clone shares the same backend, counters,
//! and metrics hooks). It is the only place where backend errors are turned
//! into degraded results: callers never branch on cache failure.
//!
//! Lock, rate-limit, cache-aside, and namespace operations are implemented on
//! the same type in their own modules.

use crate::backend::{Backend, BackendKind, CacheBackend, Connect, InMemoryBackend, RedisBackend};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::observability::{CacheMetrics, CacheStats, NoOpMetrics, StatsSnapshot};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Cache & coordination service.
///
/// # Example
///
/// ```no_run
/// use cache_coord::{CacheConfig, CacheService};
///
/// # async fn example() {
/// let cache: CacheService = CacheService::new(CacheConfig::from_env());
/// cache.init().await;
///
/// cache.set("flight:ET500", &serde_json::json!({"status": "landed"}), 300).await;
/// let status: Option<serde_json::Value> = cache.get("flight:ET500").await;
/// # }
/// ```
#[derive(Clone)]
pub struct CacheService<S: CacheBackend = RedisBackend> {
    config: Arc<CacheConfig>,
    backend: Arc<OnceCell<Backend<S>>>,
    stats: Arc<CacheStats>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<S: CacheBackend> CacheService<S> {
    /// Create an uninitialised service. Call [`init`](Self::init) once at
    /// startup; until then every operation degrades.
    pub fn new(config: CacheConfig) -> Self {
        CacheService {
            config: Arc::new(config),
            backend: Arc::new(OnceCell::new()),
            stats: Arc::new(CacheStats::new()),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Create a service over an already-chosen backend. `init` becomes a no-op.
    pub fn with_backend(config: CacheConfig, backend: Backend<S>) -> Self {
        CacheService {
            config: Arc::new(config),
            backend: Arc::new(OnceCell::new_with(Some(backend))),
            stats: Arc::new(CacheStats::new()),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Create a service running on a fresh local store.
    ///
    /// Starts the expired-entry sweeper when called inside a tokio runtime and
    /// `config.sweep_interval` is set.
    pub fn local(config: CacheConfig) -> Self {
        let local = start_local(&config);
        Self::with_backend(config, Backend::Local(local))
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = Arc::from(metrics);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The selected backend kind, or `None` before initialisation.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.get().map(Backend::kind)
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    // ------------------------------------------------------------------
    // Key-value surface
    // ------------------------------------------------------------------

    /// Read and decode a value. Any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend_for("get", key)?;
        let timer = Instant::now();

        let result = self
            .bounded(self.config.operation_timeout, "get", backend.get(key))
            .await
            .and_then(|found| found.map(|bytes| deserialize_from_cache(&bytes)).transpose());

        match result {
            Ok(Some(value)) => {
                self.stats.record_hit();
                self.metrics.record_hit(key, timer.elapsed());
                Some(value)
            }
            Ok(None) => {
                self.stats.record_miss();
                self.metrics.record_miss(key, timer.elapsed());
                None
            }
            Err(e) => {
                self.degrade("get", key, &e);
                self.stats.record_miss();
                self.metrics.record_miss(key, timer.elapsed());
                None
            }
        }
    }

    /// Store a value, overwriting any previous entry.
    ///
    /// `ttl_secs == 0` stores without expiry. Returns `false` if the value was
    /// not stored.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let Some(backend) = self.backend_for("set", key) else {
            return false;
        };
        let timer = Instant::now();

        let bytes = match serialize_for_cache(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.degrade("set", key, &e);
                return false;
            }
        };

        let ttl = ttl_from_secs(ttl_secs);
        match self
            .bounded(
                self.config.operation_timeout,
                "set",
                backend.set(key, bytes, ttl),
            )
            .await
        {
            Ok(()) => {
                self.stats.record_set();
                self.metrics.record_set(key, timer.elapsed());
                true
            }
            Err(e) => {
                self.degrade("set", key, &e);
                false
            }
        }
    }

    /// Remove a key. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.backend_for("delete", key) else {
            return false;
        };
        let timer = Instant::now();

        match self
            .bounded(self.config.operation_timeout, "delete", backend.delete(key))
            .await
        {
            Ok(()) => {
                self.stats.record_deletes(1);
                self.metrics.record_delete(key, timer.elapsed());
                true
            }
            Err(e) => {
                self.degrade("delete", key, &e);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(backend) = self.backend_for("exists", key) else {
            return false;
        };

        self.bounded(self.config.operation_timeout, "exists", backend.exists(key))
            .await
            .unwrap_or_else(|e| {
                self.degrade("exists", key, &e);
                false
            })
    }

    /// Remaining lifetime in whole seconds; `None` when absent, without
    /// expiry, or unknown.
    pub async fn ttl(&self, key: &str) -> Option<u64> {
        let backend = self.backend_for("ttl", key)?;

        match self
            .bounded(self.config.operation_timeout, "ttl", backend.ttl(key))
            .await
        {
            Ok(remaining) => remaining.map(|d| d.as_secs()),
            Err(e) => {
                self.degrade("ttl", key, &e);
                None
            }
        }
    }

    /// Delete every key matching a glob (`booking:*`, `pricing:zone?:*`).
    ///
    /// Returns the number of keys deleted, `0` on any failure.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        let Some(backend) = self.backend_for("delete_by_pattern", pattern) else {
            return 0;
        };
        let timer = Instant::now();

        match self
            .bounded(
                self.config.bulk_timeout,
                "delete_by_pattern",
                backend.delete_pattern(pattern),
            )
            .await
        {
            Ok(deleted) => {
                self.stats.record_deletes(deleted);
                self.metrics.record_delete(pattern, timer.elapsed());
                if deleted > 0 {
                    info!("Invalidated {} keys matching {}", deleted, pattern);
                }
                deleted
            }
            Err(e) => {
                self.degrade("delete_by_pattern", pattern, &e);
                0
            }
        }
    }

    /// Remove every entry in the selected store (use with caution).
    pub async fn clear(&self) -> bool {
        let Some(backend) = self.backend_for("clear", "*") else {
            return false;
        };

        match self
            .bounded(self.config.bulk_timeout, "clear", backend.clear_all())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.degrade("clear", "*", &e);
                false
            }
        }
    }

    /// Whether the selected backend is answering.
    pub async fn health_check(&self) -> bool {
        let Some(backend) = self.backend.get() else {
            return false;
        };

        self.bounded(
            self.config.operation_timeout,
            "health_check",
            backend.health_check(),
        )
        .await
        .unwrap_or_else(|e| {
            self.degrade("health_check", "-", &e);
            false
        })
    }

    /// Counters plus backend identity, for health and diagnostics endpoints.
    pub fn stats(&self) -> StatsSnapshot {
        let backend = self.backend.get();
        self.stats.snapshot(
            backend.map(Backend::kind),
            backend.is_some_and(Backend::is_distributed),
            backend.and_then(Backend::entry_count),
        )
    }

    // ------------------------------------------------------------------
    // Shared plumbing for the operation modules
    // ------------------------------------------------------------------

    /// The selected backend, or `None` (logged) before initialisation.
    pub(crate) fn backend_for(&self, op: &str, key: &str) -> Option<&Backend<S>> {
        let backend = self.backend.get();
        if backend.is_none() {
            warn!(
                "Cache {} on {} before init(); returning degraded result",
                op, key
            );
        }
        backend
    }

    /// Bound a backend call; a call that outlives `limit` becomes `Error::Timeout`.
    pub(crate) async fn bounded<T, F>(&self, limit: Duration, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("{} exceeded {:?}", op, limit))),
        }
    }

    /// Log and count an error that is being swallowed.
    pub(crate) fn degrade(&self, op: &str, key: &str, error: &Error) {
        self.stats.record_error();
        self.metrics.record_error(key, &error.to_string());
        warn!("Cache {} failed for {}: {} (degraded)", op, key, error);
    }
}

impl<S: Connect> CacheService<S> {
    /// Select the backend for the rest of the process lifetime.
    ///
    /// Idempotent and safe to call concurrently: the first call decides, later
    /// calls return the same answer. Never fails: an absent address, a
    /// connection error, or a connect that outlives `config.connect_timeout`
    /// all select the local store.
    pub async fn init(&self) -> BackendKind {
        let backend = self
            .backend
            .get_or_init(|| async {
                match self.config.redis_url.as_deref() {
                    Some(url) => {
                        let attempt = self.bounded(
                            self.config.connect_timeout,
                            "connect",
                            S::connect(url, &self.config),
                        );
                        match attempt.await {
                            Ok(shared) => {
                                info!("Cache backend selected: shared ({})", shared.name());
                                return Backend::Shared(shared);
                            }
                            Err(e) => {
                                warn!("Shared cache backend unavailable: {}", e);
                            }
                        }
                    }
                    None => info!("{}", Error::NotConfigured),
                }

                warn!(
                    "Cache backend selected: local. Locks and rate limits only \
                     hold within this process."
                );
                Backend::Local(start_local(&self.config))
            })
            .await;

        backend.kind()
    }
}

fn start_local(config: &CacheConfig) -> InMemoryBackend {
    let local = InMemoryBackend::new();
    if let Some(interval) = config.sweep_interval {
        if tokio::runtime::Handle::try_current().is_ok() {
            // Detached: the sweeper exits once the store is dropped.
            drop(local.spawn_sweeper(interval));
        }
    }
    local
}

/// `0` means "no expiry".
pub(crate) fn ttl_from_secs(ttl_secs: u64) -> Option<Duration> {
    (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs))
}
