//! Cache key management utilities.
//!
//! Keys are `:`-separated: `{prefix}:{id}` for namespaced entries,
//! `lock:{name}` for locks and `ratelimit:{identifier}` for counters.

use std::fmt::Display;

/// Prefix of lock records.
pub const LOCK_PREFIX: &str = "lock";

/// Prefix of rate-limit counters.
pub const RATE_LIMIT_PREFIX: &str = "ratelimit";

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build cache key with custom prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn Display) -> String {
        format!("{}:{}", prefix, id)
    }

    /// Build composite key from multiple parts.
    pub fn build_composite(parts: &[&str]) -> String {
        parts.join(":")
    }

    /// Glob matching every key under `prefix`.
    pub fn prefix_pattern(prefix: &str) -> String {
        format!("{}:*", prefix)
    }

    pub fn lock(name: &str) -> String {
        Self::build_with_prefix(LOCK_PREFIX, &name)
    }

    pub fn rate_limit(identifier: &str) -> String {
        Self::build_with_prefix(RATE_LIMIT_PREFIX, &identifier)
    }
}
