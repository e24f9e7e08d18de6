//! # cache-coord
//!
//! Cache and coordination layer for a booking platform.
//!
//! ## Features
//!
//! - **Two modes, chosen once:** a shared Redis backend when one is configured
//!   and reachable, otherwise a local in-process store
//! - **Never fails a request:** every backend error degrades to a miss, a
//!   no-op, `false`, `0`, or an allowed rate-limit decision, and is logged
//! - **Cache-aside:** [`CacheService::get_or_set`] with typed values
//! - **Pattern invalidation:** glob deletes with bounded `SCAN` batches on Redis
//! - **Coordination:** token-checked distributed locks and a fail-open
//!   fixed-window rate limiter
//! - **Namespaces:** fixed prefix and TTL per data class (flights, pricing,
//!   sessions, bookings, driver locations)
//!
//! ## Quick Start
//!
//! ```ignore
//! use cache_coord::{CacheConfig, CacheService};
//!
//! // Composition root: build once, init once, clone into handlers.
//! let cache: CacheService = CacheService::new(CacheConfig::from_env());
//! cache.init().await;
//!
//! // Cache-aside
//! let fare: Fare = cache
//!     .get_or_set("pricing:zone3:standard", 3600, || pricing_api.quote("zone3"))
//!     .await?;
//!
//! // Mutual exclusion for a payment callback
//! if let Some(lock) = cache.acquire_lock("payment:tx_991", 30).await {
//!     settle(&tx).await;
//!     cache.release_lock(&lock).await;
//! }
//!
//! // Rate limiting
//! if !cache.check_rate_limit(client_ip, 100, 60).await.allowed {
//!     return Err(TooManyRequests);
//! }
//!
//! // Namespaces
//! cache.flights().set("ET500", &status).await;
//! cache.bookings().invalidate_all().await;
//! ```
//!
//! In local mode, locks and rate limits only hold within the current process.
//! [`CacheService::stats`] reports which mode is active.

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod error;
pub mod expander;
pub mod key;
pub mod lock;
pub mod namespace;
pub mod observability;
pub mod pattern;
pub mod rate_limit;
pub mod serialization;
pub mod service;

// Re-exports for convenience
pub use backend::{Backend, BackendKind, CacheBackend};
pub use config::{CacheConfig, LockReleaseMode};
pub use error::{Error, Result};
pub use expander::OperationConfig;
pub use lock::LockToken;
pub use namespace::{CacheNamespace, DriverLocation, Namespace};
pub use observability::StatsSnapshot;
pub use rate_limit::RateLimitDecision;
pub use service::CacheService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
