//! Error types for the cache & coordination layer.
//!
//! These errors never cross the [`CacheService`](crate::CacheService) boundary:
//! every public operation converts them into its degraded result (miss, no-op,
//! `false`, `0`, or an allowed rate-limit decision) after logging. They are
//! returned by backends and internal helpers so that the degradation happens in
//! one place.

use std::fmt;

/// Result type for backend and internal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The shared store could not be reached or returned an error.
    ///
    /// Common causes:
    /// - Redis connection refused or dropped
    /// - Pool exhausted
    /// - Protocol error on a command
    BackendUnavailable(String),

    /// A value could not be encoded for storage.
    SerializationError(String),

    /// A stored payload could not be decoded into the requested type.
    ///
    /// Treated as a miss by the service; the next `set` overwrites the entry.
    DeserializationError(String),

    /// Stored bytes are not a cache envelope (bad magic or truncated header).
    InvalidCacheEntry(String),

    /// The envelope was written by a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// A glob pattern could not be translated to a matcher.
    InvalidPattern(String),

    /// A backend call exceeded its time budget.
    Timeout(String),

    /// No shared backend is configured. This is a valid mode, reported so that
    /// the selector can log why it chose the local store.
    NotConfigured,

    /// Invalid configuration value.
    ConfigError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendUnavailable(msg) => write!(f, "Backend unavailable: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::NotConfigured => write!(f, "Shared backend not configured"),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendUnavailable(e.to_string())
        } else if e.is_syntax() || e.is_eof() || e.is_data() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidPattern(e.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for Error {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        Error::BackendUnavailable(format!("Redis error: {}", e))
    }
}

impl From<deadpool_redis::PoolError> for Error {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Error::BackendUnavailable(format!("Failed to get Redis connection: {}", e))
    }
}
