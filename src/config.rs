//! Configuration for the cache service.
//!
//! The only setting that changes behaviour is [`CacheConfig::redis_url`]: when
//! present the service tries the shared store, when absent it runs on the
//! local in-process store. Everything else is a tuning knob with a default.

use crate::error::{Error, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default Redis connection pool size.
/// Formula: (CPU cores × 2) + 1
/// For 8-core systems: 16 connections is optimal
/// Override with REDIS_POOL_SIZE environment variable
pub const DEFAULT_POOL_SIZE: u32 = 16;

/// Default bound on reaching the shared store at startup.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single-key backend call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound on bulk calls (pattern delete, flush).
pub const DEFAULT_BULK_TIMEOUT: Duration = Duration::from_secs(10);

/// How [`CacheService::release_lock_by_name`](crate::CacheService::release_lock_by_name)
/// treats callers that do not present a holder token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockReleaseMode {
    /// Only the holder token returned by `acquire_lock` may release a lock.
    #[default]
    Owner,
    /// Any caller may release any named lock. Compatibility mode for callers
    /// written against the unchecked release.
    AnyHolder,
}

impl FromStr for LockReleaseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" | "token" => Ok(LockReleaseMode::Owner),
            "any" | "any_holder" | "anyholder" => Ok(LockReleaseMode::AnyHolder),
            other => Err(Error::ConfigError(format!(
                "unknown lock release mode '{}' (expected 'owner' or 'any')",
                other
            ))),
        }
    }
}

/// Cache service configuration.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Shared store address, e.g. `redis://cache.internal:6379/0`.
    /// `None` selects the local fallback store.
    pub redis_url: Option<String>,
    pub pool_size: u32,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub bulk_timeout: Duration,
    pub lock_release: LockReleaseMode,
    /// Interval of the local-mode expired-entry sweeper. `None` disables it;
    /// expired entries are then only dropped when touched.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            redis_url: None,
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            bulk_timeout: DEFAULT_BULK_TIMEOUT,
            lock_release: LockReleaseMode::Owner,
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - shared store address (unset or empty: local mode)
    /// - `REDIS_POOL_SIZE` - pool size (default: 16)
    /// - `CACHE_CONNECT_TIMEOUT_SECS` - startup connect bound (default: 5)
    /// - `CACHE_OPERATION_TIMEOUT_MS` - per-call bound (default: 2000)
    /// - `CACHE_LOCK_RELEASE` - `owner` or `any` (default: owner)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - local sweeper interval, `0` disables (default: 60)
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();

        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let sweep_interval = match env_parse::<u64>("CACHE_SWEEP_INTERVAL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.sweep_interval,
        };

        CacheConfig {
            redis_url,
            pool_size: env_parse("REDIS_POOL_SIZE").unwrap_or(defaults.pool_size),
            connect_timeout: env_parse("CACHE_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            operation_timeout: env_parse("CACHE_OPERATION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.operation_timeout),
            bulk_timeout: defaults.bulk_timeout,
            lock_release: env_parse("CACHE_LOCK_RELEASE").unwrap_or(defaults.lock_release),
            sweep_interval,
        }
    }

    /// Set the shared store address.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Set the lock release mode.
    pub fn with_lock_release(mut self, mode: LockReleaseMode) -> Self {
        self.lock_release = mode;
        self
    }

    /// Set the per-call timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set or disable the local sweeper interval.
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: '{}'", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert!(config.redis_url.is_none());
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.lock_release, LockReleaseMode::Owner);
    }

    #[test]
    fn test_config_builders() {
        let config = CacheConfig::default()
            .with_redis_url("redis://localhost:6379/0")
            .with_lock_release(LockReleaseMode::AnyHolder)
            .with_operation_timeout(Duration::from_millis(300))
            .with_sweep_interval(None);

        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379/0"));
        assert_eq!(config.lock_release, LockReleaseMode::AnyHolder);
        assert_eq!(config.operation_timeout, Duration::from_millis(300));
        assert!(config.sweep_interval.is_none());
    }

    #[test]
    fn test_lock_release_mode_parse() {
        assert_eq!(
            "owner".parse::<LockReleaseMode>().unwrap(),
            LockReleaseMode::Owner
        );
        assert_eq!(
            " ANY ".parse::<LockReleaseMode>().unwrap(),
            LockReleaseMode::AnyHolder
        );
        assert!("sometimes".parse::<LockReleaseMode>().is_err());
    }

    #[test]
    fn test_config_from_env() {
        // All env-dependent assertions live in one test to avoid races between tests.
        env::set_var("REDIS_URL", "  ");
        env::set_var("REDIS_POOL_SIZE", "not-a-number");
        env::set_var("CACHE_OPERATION_TIMEOUT_MS", "250");
        env::set_var("CACHE_LOCK_RELEASE", "any");
        env::set_var("CACHE_SWEEP_INTERVAL_SECS", "0");

        let config = CacheConfig::from_env();
        assert!(config.redis_url.is_none());
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.operation_timeout, Duration::from_millis(250));
        assert_eq!(config.lock_release, LockReleaseMode::AnyHolder);
        assert!(config.sweep_interval.is_none());

        env::set_var("REDIS_URL", "redis://cache:6379/1");
        let config = CacheConfig::from_env();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/1"));

        for name in [
            "REDIS_URL",
            "REDIS_POOL_SIZE",
            "CACHE_OPERATION_TIMEOUT_MS",
            "CACHE_LOCK_RELEASE",
            "CACHE_SWEEP_INTERVAL_SECS",
        ] {
            env::remove_var(name);
        }
    }
}
