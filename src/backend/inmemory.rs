//! In-memory cache backend (local fallback, thread-safe, async).
//!
//! Uses DashMap for concurrent access with per-key sharding.
//! Expired entries are dropped when touched and, optionally, by a background
//! sweeper.
//!
//! Everything stored here is visible to this process only. Locks and rate
//! limits built on it protect against concurrent tasks in one instance, not
//! against other instances.

use super::CacheBackend;
use crate::error::{Error, Result};
use crate::pattern::GlobPattern;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// In-memory cache entry with optional expiration.
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        CacheEntry { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

/// Thread-safe async in-memory cache backend.
///
/// Clones share the same underlying map.
///
/// # Example
///
/// ```no_run
/// use cache_coord::backend::{InMemoryBackend, CacheBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("flight:ET500", b"landed".to_vec(), Some(Duration::from_secs(300))).await?;
///     assert!(backend.get("flight:ET500").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of unexpired entries.
    pub fn live_len(&self) -> usize {
        self.store.iter().filter(|entry| !entry.is_expired()).count()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        self.store.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Spawn a task that purges expired entries every `interval`.
    ///
    /// The task holds only a weak reference and exits once every clone of
    /// this backend has been dropped. Must be called within a tokio runtime.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store: Weak<DashMap<String, CacheEntry>> = Arc::downgrade(&self.store);

        tokio::spawn(async move {
            info!("Starting local cache sweeper (interval: {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(store) = store.upgrade() else {
                    debug!("Local cache dropped, sweeper exiting");
                    break;
                };

                let removed = InMemoryBackend { store }.purge_expired();
                if removed > 0 {
                    debug!("Local cache sweep: removed {} expired entries", removed);
                }
            }
        })
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_counter(data: &[u8]) -> Result<u64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::InvalidCacheEntry("value is not an integer".to_string()))
}

impl CacheBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Only drop the entry if it is still the expired one.
        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(value, ttl);
        self.store.insert(key.to_string(), entry);

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if let Some(entry) = self.store.get(key) {
            return Ok(!entry.is_expired());
        }

        Ok(false)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        match self.store.get(key) {
            Some(entry) if !entry.is_expired() => Ok(entry.remaining()),
            _ => Ok(None),
        }
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let stored = match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value, Some(ttl)));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, Some(ttl)));
                true
            }
        };

        debug!("✓ InMemory SETNX {} -> {}", key, stored);
        Ok(stored)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let removed = self
            .store
            .remove_if(key, |_, entry| !entry.is_expired() && entry.data == expected)
            .is_some();

        debug!("✓ InMemory CAD {} -> {}", key, removed);
        Ok(removed)
    }

    async fn incr(&self, key: &str, window: Duration) -> Result<u64> {
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(b"0".to_vec(), None));

        if entry.is_expired() {
            *entry = CacheEntry::new(b"0".to_vec(), None);
        }

        let next = parse_counter(&entry.data)?.saturating_add(1);
        entry.data = next.to_string().into_bytes();
        // Also re-arms a live counter that lost its expiry.
        if entry.expires_at.is_none() {
            entry.expires_at = Some(Instant::now() + window);
        }

        debug!("✓ InMemory INCR {} -> {}", key, next);
        Ok(next)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let glob = GlobPattern::new(pattern)?;

        // Collect first: removing while iterating would deadlock on the shard.
        let matched: Vec<(String, bool)> = self
            .store
            .iter()
            .filter(|entry| glob.is_match(entry.key()))
            .map(|entry| (entry.key().clone(), entry.is_expired()))
            .collect();

        let mut deleted = 0;
        for (key, expired) in matched {
            if self.store.remove(&key).is_some() && !expired {
                deleted += 1;
            }
        }

        debug!("✓ InMemory DELETE_PATTERN {} -> {} keys", pattern, deleted);
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<bool> {
        // In-memory backend is always healthy
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}
