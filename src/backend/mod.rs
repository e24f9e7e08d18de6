//! Cache backend implementations.
//!
//! Two backends exist: [`RedisBackend`] (shared across processes) and
//! [`InMemoryBackend`] (local to this process). [`Backend`] is the tagged union
//! the service holds once the mode has been chosen; all mode branching lives
//! in its `CacheBackend` impl.

use crate::config::CacheConfig;
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[cfg(test)]
pub(crate) mod failing;
pub mod inmemory;
pub mod redis;

pub use inmemory::InMemoryBackend;
pub use redis::RedisBackend;

/// Trait for cache backend implementations.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or external storage.
///
/// Backends report failures as `Err`; deciding what a failure degrades to is
/// the service's job, not the backend's.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Short backend name for logs and stats (`"redis"`, `"memory"`).
    fn name(&self) -> &'static str;

    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Cache miss (key not found or expired)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value, overwriting any previous entry.
    ///
    /// `ttl: None` stores without expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove value from cache. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists in cache.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remaining time-to-live.
    ///
    /// `Ok(None)` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Store `value` only if `key` is absent, with a mandatory expiry.
    ///
    /// Returns `true` when the value was stored.
    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns `true` when the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool>;

    /// Atomically increment a counter, starting its expiry on the first
    /// increment. The expiry is not extended by later increments.
    ///
    /// Returns the value after incrementing.
    async fn incr(&self, key: &str, window: Duration) -> Result<u64>;

    /// Delete every key matching a glob pattern.
    ///
    /// Returns the number of keys deleted.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    /// Health check - verify backend is accessible.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Clear all cache (use with caution).
    async fn clear_all(&self) -> Result<()>;
}

/// Backends that can be reached from a connection address at startup.
#[allow(async_fn_in_trait)]
pub trait Connect: CacheBackend + Sized {
    /// Connect and verify the backend is answering.
    ///
    /// The caller bounds this with `config.connect_timeout`.
    async fn connect(url: &str, config: &CacheConfig) -> Result<Self>;
}

/// Which kind of backend the service settled on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Cross-process store; locks and rate limits hold across instances.
    Shared,
    /// In-process store; locks and rate limits hold within this process only.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Shared => write!(f, "shared"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

/// The backend selected for the lifetime of a service.
#[derive(Clone)]
pub enum Backend<S> {
    Shared(S),
    Local(InMemoryBackend),
}

impl<S: CacheBackend> Backend<S> {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Shared(_) => BackendKind::Shared,
            Backend::Local(_) => BackendKind::Local,
        }
    }

    /// Whether locks and rate limits are visible to other processes.
    pub fn is_distributed(&self) -> bool {
        matches!(self, Backend::Shared(_))
    }

    /// Live entry count; only known for the local store.
    pub fn entry_count(&self) -> Option<usize> {
        match self {
            Backend::Shared(_) => None,
            Backend::Local(local) => Some(local.live_len()),
        }
    }
}

impl<S: CacheBackend> CacheBackend for Backend<S> {
    fn name(&self) -> &'static str {
        match self {
            Backend::Shared(b) => b.name(),
            Backend::Local(b) => b.name(),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Backend::Shared(b) => b.get(key).await,
            Backend::Local(b) => b.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        match self {
            Backend::Shared(b) => b.set(key, value, ttl).await,
            Backend::Local(b) => b.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Backend::Shared(b) => b.delete(key).await,
            Backend::Local(b) => b.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Backend::Shared(b) => b.exists(key).await,
            Backend::Local(b) => b.exists(key).await,
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        match self {
            Backend::Shared(b) => b.ttl(key).await,
            Backend::Local(b) => b.ttl(key).await,
        }
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        match self {
            Backend::Shared(b) => b.set_nx(key, value, ttl).await,
            Backend::Local(b) => b.set_nx(key, value, ttl).await,
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        match self {
            Backend::Shared(b) => b.compare_and_delete(key, expected).await,
            Backend::Local(b) => b.compare_and_delete(key, expected).await,
        }
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<u64> {
        match self {
            Backend::Shared(b) => b.incr(key, window).await,
            Backend::Local(b) => b.incr(key, window).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        match self {
            Backend::Shared(b) => b.delete_pattern(pattern).await,
            Backend::Local(b) => b.delete_pattern(pattern).await,
        }
    }

    async fn health_check(&self) -> Result<bool> {
        match self {
            Backend::Shared(b) => b.health_check().await,
            Backend::Local(b) => b.health_check().await,
        }
    }

    async fn clear_all(&self) -> Result<()> {
        match self {
            Backend::Shared(b) => b.clear_all().await,
            Backend::Local(b) => b.clear_all().await,
        }
    }
}
