//! Versioned envelope serialization for cache values.
//!
//! Every value written through [`CacheService::set`](crate::CacheService::set)
//! is wrapped in a fixed header followed by a JSON payload:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│  JSON PAYLOAD (N bytes)  │
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "CCRD"              u32 (LE)          serde_json::to_vec(T)
//! ```
//!
//! JSON keeps payloads self-describing, so a value written by one service
//! instance can be read back as `serde_json::Value` or any compatible struct
//! by another.
//!
//! # Example
//!
//! ```rust
//! use cache_coord::serialization::{serialize_for_cache, deserialize_from_cache};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct FlightStatus {
//!     status: String,
//! }
//!
//! # fn main() -> cache_coord::Result<()> {
//! let status = FlightStatus { status: "landed".to_string() };
//! let bytes = serialize_for_cache(&status)?;
//! assert_eq!(&bytes[0..4], b"CCRD");
//!
//! let decoded: FlightStatus = deserialize_from_cache(&bytes)?;
//! assert_eq!(status, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Magic header for cache entries: b"CCRD"
pub const CACHE_MAGIC: [u8; 4] = *b"CCRD";

/// Current schema version.
///
/// Increment when the envelope layout changes. Entries written under another
/// version decode as [`Error::VersionMismatch`] and are treated as misses.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Length of the fixed envelope header (magic + version).
pub const HEADER_LEN: usize = 8;

/// Serialize a value with envelope for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if the value cannot be encoded as JSON
/// (for example a map with non-string keys).
pub fn serialize_for_cache<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&CACHE_MAGIC);
    bytes.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a value from cache storage with validation.
///
/// Checks, in order: header length, magic, schema version, then decodes the
/// JSON payload into `T`.
///
/// # Errors
///
/// - `Error::InvalidCacheEntry`: truncated header or wrong magic
/// - `Error::VersionMismatch`: schema version mismatch
/// - `Error::DeserializationError`: payload does not decode into `T`
pub fn deserialize_from_cache<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::InvalidCacheEntry(format!(
            "entry too short: {} bytes",
            bytes.len()
        )));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);

    if header[0..4] != CACHE_MAGIC {
        warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC,
            &header[0..4]
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC,
            &header[0..4]
        )));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: version,
        });
    }

    serde_json::from_slice(payload).map_err(|e| Error::DeserializationError(e.to_string()))
}
