//! Redis Backend Integration Tests
//!
//! These tests require a running Redis instance and skip themselves when none
//! is reachable.
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis:7
//! cargo test --test redis_integration_test
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
//!
//! ## What's Tested
//!
//! 1. Backend selection picks the shared store
//! 2. Set/get/delete/ttl through the service
//! 3. SCAN-based pattern deletes
//! 4. Token-checked locks across service instances
//! 5. Rate limiting across service instances
//!
//! Every test works under its own random key prefix so runs do not collide.

use cache_coord::backend::{CacheBackend, RedisBackend};
use cache_coord::{BackendKind, CacheConfig, CacheService};
use futures::future::join_all;
use std::env;
use std::time::Duration;

/// Helper: Get Redis connection URL from environment or use default
fn get_redis_url() -> String {
    env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn config() -> CacheConfig {
    CacheConfig::default()
        .with_redis_url(get_redis_url())
        .with_sweep_interval(None)
}

/// Helper: an initialised service on Redis, or `None` to skip.
async fn shared_service() -> Option<CacheService<RedisBackend>> {
    let cache: CacheService<RedisBackend> = CacheService::new(config());
    match cache.init().await {
        BackendKind::Shared => Some(cache),
        BackendKind::Local => {
            println!("⚠️  Redis not available at {}, skipping test", get_redis_url());
            None
        }
    }
}

fn unique_prefix() -> String {
    format!("cache_coord_test:{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_redis_selected_as_shared() {
    let Some(cache) = shared_service().await else {
        return;
    };

    let stats = cache.stats();
    assert_eq!(stats.backend, Some(BackendKind::Shared));
    assert!(stats.distributed);
    assert_eq!(stats.entries, None);
    assert!(cache.health_check().await);
}

#[tokio::test]
async fn test_redis_kv_roundtrip() {
    let Some(cache) = shared_service().await else {
        return;
    };
    let key = format!("{}:flight:ET500", unique_prefix());

    assert!(cache.set(&key, &serde_json::json!({"status": "landed"}), 300).await);
    assert_eq!(
        cache.get::<serde_json::Value>(&key).await,
        Some(serde_json::json!({"status": "landed"}))
    );

    let ttl = cache.ttl(&key).await.expect("Key should have a TTL");
    assert!(ttl > 295 && ttl <= 300);

    assert!(cache.delete(&key).await);
    assert_eq!(cache.get::<serde_json::Value>(&key).await, None);
}

#[tokio::test]
async fn test_redis_ttl_expiration() {
    let Some(cache) = shared_service().await else {
        return;
    };
    let key = format!("{}:short", unique_prefix());

    cache.set(&key, &"soon gone", 1).await;
    assert!(cache.exists(&key).await);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!cache.exists(&key).await);
}

#[tokio::test]
async fn test_redis_delete_by_pattern() {
    let Some(cache) = shared_service().await else {
        return;
    };
    let prefix = unique_prefix();

    // More than one SCAN batch.
    for i in 0..250 {
        cache.set(&format!("{}:booking:{}", prefix, i), &i, 600).await;
    }
    cache.set(&format!("{}:session:ABC123", prefix), &"blob", 600).await;

    let deleted = cache.delete_by_pattern(&format!("{}:booking:*", prefix)).await;
    assert_eq!(deleted, 250);
    assert!(cache.exists(&format!("{}:session:ABC123", prefix)).await);

    cache.delete_by_pattern(&format!("{}:*", prefix)).await;
}

#[tokio::test]
async fn test_redis_lock_across_instances() {
    let Some(first) = shared_service().await else {
        return;
    };
    let Some(second) = shared_service().await else {
        return;
    };
    let name = unique_prefix();

    let attempts = join_all(
        (0..10).map(|i| {
            let cache = if i % 2 == 0 { &first } else { &second };
            cache.acquire_lock(&name, 30)
        }),
    )
    .await;
    let mut winners: Vec<_> = attempts.into_iter().flatten().collect();
    assert_eq!(winners.len(), 1);

    let lock = winners.pop().expect("One winner");
    assert!(second.acquire_lock(&name, 30).await.is_none());
    assert!(first.release_lock(&lock).await);
    assert!(second.acquire_lock(&name, 30).await.is_some());
}

#[tokio::test]
async fn test_redis_stale_token_cannot_release() {
    let Some(cache) = shared_service().await else {
        return;
    };
    let name = unique_prefix();

    let stale = cache
        .acquire_lock(&name, 1)
        .await
        .expect("Failed to acquire free lock");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let current = cache
        .acquire_lock(&name, 30)
        .await
        .expect("Failed to acquire expired lock");

    assert!(!cache.release_lock(&stale).await);
    assert!(cache.release_lock(&current).await);
}

#[tokio::test]
async fn test_redis_rate_limit_across_instances() {
    let Some(first) = shared_service().await else {
        return;
    };
    let Some(second) = shared_service().await else {
        return;
    };
    let id = unique_prefix();

    assert!(first.check_rate_limit(&id, 3, 60).await.allowed);
    assert!(second.check_rate_limit(&id, 3, 60).await.allowed);
    assert!(first.check_rate_limit(&id, 3, 60).await.allowed);

    let denied = second.check_rate_limit(&id, 3, 60).await;
    assert!(!denied.allowed);
    assert_eq!(denied.current, 4);

    assert!(first.reset_rate_limit(&id).await);
}

#[tokio::test]
async fn test_redis_backend_direct() {
    let backend = match RedisBackend::from_connection_string(&get_redis_url()).await {
        Ok(backend) => backend,
        Err(_) => {
            println!("⚠️  Redis not available, skipping test");
            return;
        }
    };
    if !backend.health_check().await.unwrap_or(false) {
        println!("⚠️  Redis not available, skipping test");
        return;
    }

    let key = format!("{}:counter", unique_prefix());
    let window = Duration::from_secs(60);

    assert_eq!(backend.incr(&key, window).await.expect("INCR failed"), 1);
    assert_eq!(backend.incr(&key, window).await.expect("INCR failed"), 2);
    let ttl = backend
        .ttl(&key)
        .await
        .expect("TTL failed")
        .expect("Counter should expire");
    assert!(ttl <= window);

    backend.delete(&key).await.expect("DEL failed");
}
