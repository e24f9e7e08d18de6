//! Distributed mutual exclusion with automatic expiry.
//!
//! A lock is the record `lock:{name}` holding a random token, created only if
//! absent and expiring after its TTL so a crashed holder cannot wedge it.
//! Release is compare-and-delete on that token: a holder whose lock expired
//! and was re-acquired by someone else cannot release the new holder's lock.
//!
//! The lock is advisory and not fenced. Work that can outlive the TTL must
//! be made idempotent by the caller.

use crate::backend::CacheBackend;
use crate::config::LockReleaseMode;
use crate::key::CacheKeyBuilder;
use crate::service::CacheService;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Proof of a successful [`CacheService::acquire_lock`].
///
/// Hand it back to [`CacheService::release_lock`]. Dropping it does not
/// release the lock; the TTL does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    name: String,
    key: String,
    token: String,
}

impl LockToken {
    fn generate(name: &str) -> Self {
        LockToken {
            name: name.to_string(),
            key: CacheKeyBuilder::lock(name),
            token: Uuid::new_v4().to_string(),
        }
    }

    /// Lock name as passed to `acquire_lock`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage key of the lock record.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Holder identity written into the lock record.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl<S: CacheBackend> CacheService<S> {
    /// Try to take the lock `name` for `ttl_secs` seconds.
    ///
    /// Returns `None` when another holder has it, or when the backend cannot
    /// be reached (an unknown lock state is never reported as acquired).
    /// A `ttl_secs` of `0` is raised to one second; locks always expire.
    pub async fn acquire_lock(&self, name: &str, ttl_secs: u64) -> Option<LockToken> {
        let lock = LockToken::generate(name);
        let backend = self.backend_for("acquire_lock", lock.key())?;
        let ttl = Duration::from_secs(ttl_secs.max(1));

        let acquired = self
            .bounded(
                self.config().operation_timeout,
                "acquire_lock",
                backend.set_nx(lock.key(), lock.token().as_bytes().to_vec(), ttl),
            )
            .await;

        match acquired {
            Ok(true) => {
                debug!("Acquired lock {} for {:?}", lock.key(), ttl);
                Some(lock)
            }
            Ok(false) => {
                debug!("Lock {} is held elsewhere", lock.key());
                None
            }
            Err(e) => {
                self.degrade("acquire_lock", lock.key(), &e);
                None
            }
        }
    }

    /// Release a lock this caller holds.
    ///
    /// Returns `false` if the lock had already expired, is now held by
    /// someone else, or the backend failed.
    pub async fn release_lock(&self, lock: &LockToken) -> bool {
        let Some(backend) = self.backend_for("release_lock", lock.key()) else {
            return false;
        };

        let released = self
            .bounded(
                self.config().operation_timeout,
                "release_lock",
                backend.compare_and_delete(lock.key(), lock.token().as_bytes()),
            )
            .await;

        match released {
            Ok(true) => {
                debug!("Released lock {}", lock.key());
                true
            }
            Ok(false) => {
                warn!(
                    "Lock {} was no longer held by this caller at release",
                    lock.key()
                );
                false
            }
            Err(e) => {
                self.degrade("release_lock", lock.key(), &e);
                false
            }
        }
    }

    /// Release `name` regardless of holder.
    ///
    /// Only honoured under [`LockReleaseMode::AnyHolder`]; with the default
    /// owner-checked mode this logs and returns `false`.
    pub async fn release_lock_by_name(&self, name: &str) -> bool {
        let key = CacheKeyBuilder::lock(name);

        if self.config().lock_release != LockReleaseMode::AnyHolder {
            warn!(
                "Refusing holder-less release of {}; lock release mode is owner",
                key
            );
            return false;
        }

        self.delete(&key).await
    }

    /// Run `f` while holding `name`.
    ///
    /// Returns `None` without running `f` if the lock could not be taken.
    /// The lock is released after `f` completes.
    pub async fn with_lock<F, Fut, R>(&self, name: &str, ttl_secs: u64, f: F) -> Option<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let lock = self.acquire_lock(name, ttl_secs).await?;
        let output = f().await;
        self.release_lock(&lock).await;
        Some(output)
    }
}
