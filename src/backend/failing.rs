//! Backend that never succeeds, for exercising degraded paths.

use super::CacheBackend;
use crate::error::{Error, Result};
use std::time::Duration;

/// How every call on a [`FailingBackend`] goes wrong.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Failure {
    /// Return `Error::BackendUnavailable` immediately.
    Unavailable,
    /// Never complete; only a timeout ends the call.
    Hang,
}

#[derive(Clone, Debug)]
pub(crate) struct FailingBackend {
    failure: Failure,
}

impl FailingBackend {
    pub(crate) fn new(failure: Failure) -> Self {
        FailingBackend { failure }
    }

    async fn fail<T>(&self) -> Result<T> {
        match self.failure {
            Failure::Unavailable => Err(Error::BackendUnavailable(
                "connection refused".to_string(),
            )),
            Failure::Hang => std::future::pending().await,
        }
    }
}

impl CacheBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        self.fail().await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        self.fail().await
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        self.fail().await
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        self.fail().await
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>> {
        self.fail().await
    }

    async fn set_nx(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<bool> {
        self.fail().await
    }

    async fn compare_and_delete(&self, _key: &str, _expected: &[u8]) -> Result<bool> {
        self.fail().await
    }

    async fn incr(&self, _key: &str, _window: Duration) -> Result<u64> {
        self.fail().await
    }

    async fn delete_pattern(&self, _pattern: &str) -> Result<u64> {
        self.fail().await
    }

    async fn health_check(&self) -> Result<bool> {
        self.fail().await
    }

    async fn clear_all(&self) -> Result<()> {
        self.fail().await
    }
}
