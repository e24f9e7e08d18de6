//! Cache-aside orchestration: look up, compute on miss, cache on success.
//!
//! There is deliberately no single-flight de-duplication. Two callers that
//! miss on the same key at the same time both run `compute`, and the last
//! write wins. Callers that need at-most-once computation wrap the call in
//! [`CacheService::with_lock`].

use crate::backend::CacheBackend;
use crate::service::CacheService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

/// Per-call overrides for [`CacheService::get_or_set_with`].
///
/// # Example
///
/// ```ignore
/// use cache_coord::OperationConfig;
///
/// // Flash sale: cache for one minute instead of the namespace's hour.
/// let config = OperationConfig::default().with_ttl(60);
/// cache.get_or_set_with("pricing:zone3:standard", 3600, config, compute).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct OperationConfig {
    /// Override the TTL (seconds) for this call only.
    ///
    /// - **If `Some(secs)`**: used instead of the caller's default TTL
    /// - **If `None`**: the default TTL applies
    pub ttl_override: Option<u64>,

    /// Skip the lookup, recompute, and overwrite the cached value.
    pub force_refresh: bool,
}

impl OperationConfig {
    /// Override TTL for this operation.
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_override = Some(ttl_secs);
        self
    }

    /// Recompute even if a cached value exists.
    pub fn refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Whether a computed value is worth caching: anything but `null`, `""`,
/// `[]`, or `{}`.
pub fn is_cacheable<T: Serialize + ?Sized>(value: &T) -> bool {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) => false,
        Ok(serde_json::Value::String(s)) => !s.is_empty(),
        Ok(serde_json::Value::Array(items)) => !items.is_empty(),
        Ok(serde_json::Value::Object(fields)) => !fields.is_empty(),
        Ok(_) => true,
        Err(_) => false,
    }
}

impl<S: CacheBackend> CacheService<S> {
    /// Return the cached value for `key`, or run `compute`, cache its result
    /// for `ttl_secs`, and return it.
    ///
    /// - Hit: `compute` is not invoked.
    /// - Miss: `compute` is invoked exactly once. `Ok` values are cached when
    ///   [`is_cacheable`]; `Err` is returned uncached.
    ///
    /// Cache failures never surface: a broken backend behaves like a
    /// permanent miss.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, ttl_secs: u64, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_set_with(key, ttl_secs, OperationConfig::default(), compute)
            .await
    }

    /// [`get_or_set`](Self::get_or_set) with per-call overrides.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_set_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        config: OperationConfig,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if config.force_refresh {
            debug!("» Forced refresh for {}", key);
        } else if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        debug!("Cache miss for {}, computing", key);
        let value = compute().await?;

        if is_cacheable(&value) {
            let ttl = config.ttl_override.unwrap_or(ttl_secs);
            self.set(key, &value, ttl).await;
        } else {
            debug!("Computed value for {} is empty, not caching", key);
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::config::CacheConfig;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Fare {
        zone: String,
        amount_cents: u64,
    }

    fn service() -> CacheService<InMemoryBackend> {
        CacheService::local(CacheConfig::default().with_sweep_interval(None))
    }

    #[test]
    fn test_is_cacheable() {
        assert!(!is_cacheable(&serde_json::Value::Null));
        assert!(!is_cacheable(&Option::<u32>::None));
        assert!(!is_cacheable(""));
        assert!(!is_cacheable(&Vec::<u32>::new()));
        assert!(!is_cacheable(&serde_json::json!({})));

        assert!(is_cacheable(&0u32));
        assert!(is_cacheable(&false));
        assert!(is_cacheable("x"));
        assert!(is_cacheable(&vec![1]));
        assert!(is_cacheable(&Some(3u8)));
    }

    #[tokio::test]
    async fn test_get_or_set_miss_then_hit() {
        let service = service();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let compute = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(Fare {
                zone: "zone3".to_string(),
                amount_cents: 4200,
            })
        };

        let first = service
            .get_or_set("pricing:zone3:standard", 3600, compute)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second: Fare = service
            .get_or_set("pricing:zone3:standard", 3600, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Fare, String>("must not be called".to_string())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_get_or_set_does_not_cache_empty() {
        let service = service();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..2 {
            let value: Option<Fare> = service
                .get_or_set("pricing:zone9:none", 3600, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(None)
                })
                .await
                .unwrap();
            assert!(value.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!service.exists("pricing:zone9:none").await);
    }

    #[tokio::test]
    async fn test_get_or_set_error_propagates_uncached() {
        let service = service();

        let result: Result<Fare, String> = service
            .get_or_set("pricing:zone1:standard", 3600, || async {
                Err("pricing service down".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "pricing service down");
        assert!(!service.exists("pricing:zone1:standard").await);
    }

    #[tokio::test]
    async fn test_concurrent_cold_misses_both_compute() {
        let service = service();
        let calls = Arc::new(AtomicUsize::new(0));
        // Both computations must be in flight at once to pass the barrier.
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let run = |label: u64| {
            let service = service.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            async move {
                service
                    .get_or_set("pricing:zone3:standard", 3600, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        barrier.wait().await;
                        Ok::<_, String>(label)
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(1), run(2));
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_or_set_with_force_refresh() {
        let service = service();
        service.set("flight:ET500", &"boarding", 300).await;

        let value: String = service
            .get_or_set_with(
                "flight:ET500",
                300,
                OperationConfig::default().refresh(),
                || async { Ok::<_, String>("departed".to_string()) },
            )
            .await
            .unwrap();

        assert_eq!(value, "departed");
        assert_eq!(
            service.get::<String>("flight:ET500").await.as_deref(),
            Some("departed")
        );
    }

    #[tokio::test]
    async fn test_get_or_set_with_ttl_override() {
        let service = service();

        service
            .get_or_set_with(
                "pricing:zone3:flash",
                3600,
                OperationConfig::default().with_ttl(60),
                || async { Ok::<_, String>(1999u64) },
            )
            .await
            .unwrap();

        let ttl = service.ttl("pricing:zone3:flash").await.unwrap();
        assert!(ttl <= 60 && ttl >= 59);
    }
}
