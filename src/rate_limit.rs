//! Fixed-window request counting.
//!
//! Each identifier gets a counter at `ratelimit:{identifier}`. The first hit
//! in a window creates it with the window as its expiry; later hits only
//! increment. A request is allowed while the post-increment count is within
//! the limit.
//!
//! The limiter fails open: if the backend cannot be reached the request is
//! allowed. It protects capacity, not correctness.

use crate::backend::CacheBackend;
use crate::key::CacheKeyBuilder;
use crate::service::CacheService;
use serde::Serialize;
use std::time::Duration;

/// Outcome of [`CacheService::check_rate_limit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests counted in the current window, including this one.
    pub current: u64,
    pub remaining: u64,
    pub limit: u64,
}

impl RateLimitDecision {
    fn counted(current: u64, limit: u64) -> Self {
        RateLimitDecision {
            allowed: current <= limit,
            current,
            remaining: limit.saturating_sub(current),
            limit,
        }
    }

    /// The decision when nothing could be counted.
    fn fail_open(limit: u64) -> Self {
        RateLimitDecision {
            allowed: true,
            current: 0,
            remaining: limit,
            limit,
        }
    }
}

impl<S: CacheBackend> CacheService<S> {
    /// Count one request from `identifier` against `limit` per
    /// `window_secs`.
    ///
    /// Every call counts, including denied ones. A `window_secs` of `0` is
    /// raised to one second.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        limit: u64,
        window_secs: u64,
    ) -> RateLimitDecision {
        let key = CacheKeyBuilder::rate_limit(identifier);
        let Some(backend) = self.backend_for("check_rate_limit", &key) else {
            return RateLimitDecision::fail_open(limit);
        };
        let window = Duration::from_secs(window_secs.max(1));

        match self
            .bounded(
                self.config().operation_timeout,
                "check_rate_limit",
                backend.incr(&key, window),
            )
            .await
        {
            Ok(current) => {
                let decision = RateLimitDecision::counted(current, limit);
                if !decision.allowed {
                    debug!(
                        "Rate limit exceeded for {}: {}/{} in {:?}",
                        identifier, current, limit, window
                    );
                }
                decision
            }
            Err(e) => {
                self.degrade("check_rate_limit", &key, &e);
                RateLimitDecision::fail_open(limit)
            }
        }
    }

    /// Drop the counter for `identifier`, starting a fresh window on the
    /// next request.
    pub async fn reset_rate_limit(&self, identifier: &str) -> bool {
        self.delete(&CacheKeyBuilder::rate_limit(identifier)).await
    }
}
