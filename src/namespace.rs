//! Fixed-prefix, fixed-TTL views over the cache, one per data class.
//!
//! A namespace binds a key prefix and a TTL policy matching how quickly the
//! data goes stale, so call sites cannot collide on keys or drift on TTLs:
//!
//! | Namespace        | Prefix            | TTL      |
//! |------------------|-------------------|----------|
//! | driver locations | `driver_location` | 30 s     |
//! | flight status    | `flight`          | 5 min    |
//! | bookings         | `booking`         | 10 min   |
//! | pricing tables   | `pricing`         | 1 h      |
//! | sessions         | `session`         | 24 h     |
//!
//! ```ignore
//! let flights = cache.flights();
//! flights.set("ET500", &status).await;          // flight:ET500, 300s
//! let status: Option<Status> = flights.get("ET500").await;
//! cache.bookings().invalidate_all().await;      // booking:*
//! ```

use crate::backend::CacheBackend;
use crate::key::CacheKeyBuilder;
use crate::service::CacheService;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

/// A data class with its own key prefix and TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    DriverLocation,
    Flight,
    Booking,
    Pricing,
    Session,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 5] = [
        CacheNamespace::DriverLocation,
        CacheNamespace::Flight,
        CacheNamespace::Booking,
        CacheNamespace::Pricing,
        CacheNamespace::Session,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            CacheNamespace::DriverLocation => "driver_location",
            CacheNamespace::Flight => "flight",
            CacheNamespace::Booking => "booking",
            CacheNamespace::Pricing => "pricing",
            CacheNamespace::Session => "session",
        }
    }

    /// TTL applied to every write in this namespace.
    pub fn ttl_secs(self) -> u64 {
        match self {
            CacheNamespace::DriverLocation => 30,
            CacheNamespace::Flight => 5 * 60,
            CacheNamespace::Booking => 10 * 60,
            CacheNamespace::Pricing => 60 * 60,
            CacheNamespace::Session => 24 * 60 * 60,
        }
    }

    /// `{prefix}:{id}`
    pub fn key(self, id: impl Display) -> String {
        CacheKeyBuilder::build_with_prefix(self.prefix(), &id)
    }

    /// `{prefix}:{part}:{part}...`
    pub fn composite_key(self, parts: &[&str]) -> String {
        let mut all = Vec::with_capacity(parts.len() + 1);
        all.push(self.prefix());
        all.extend_from_slice(parts);
        CacheKeyBuilder::build_composite(&all)
    }

    /// Glob matching every key in the namespace.
    pub fn pattern(self) -> String {
        CacheKeyBuilder::prefix_pattern(self.prefix())
    }
}

impl Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A borrowed view of a [`CacheService`] scoped to one namespace.
pub struct Namespace<'a, S: CacheBackend> {
    service: &'a CacheService<S>,
    namespace: CacheNamespace,
}

impl<'a, S: CacheBackend> Namespace<'a, S> {
    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn key(&self, id: impl Display) -> String {
        self.namespace.key(id)
    }

    pub async fn get<T: DeserializeOwned>(&self, id: impl Display) -> Option<T> {
        self.service.get(&self.key(id)).await
    }

    /// Write with the namespace TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, id: impl Display, value: &T) -> bool {
        self.service
            .set(&self.key(id), value, self.namespace.ttl_secs())
            .await
    }

    pub async fn delete(&self, id: impl Display) -> bool {
        self.service.delete(&self.key(id)).await
    }

    pub async fn exists(&self, id: impl Display) -> bool {
        self.service.exists(&self.key(id)).await
    }

    /// Cache-aside with the namespace TTL.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_set<T, E, F, Fut>(&self, id: impl Display, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.service
            .get_or_set(&self.key(id), self.namespace.ttl_secs(), compute)
            .await
    }

    /// Delete every key in the namespace. Returns the number removed.
    pub async fn invalidate_all(&self) -> u64 {
        self.service.delete_by_pattern(&self.namespace.pattern()).await
    }
}

/// Last reported position of a driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees clockwise from north, when the device reports one.
    pub heading: Option<f64>,
    /// Unix seconds.
    pub recorded_at: u64,
}

impl DriverLocation {
    /// A position recorded now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        DriverLocation {
            latitude,
            longitude,
            heading: None,
            recorded_at,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }
}

impl<S: CacheBackend> CacheService<S> {
    pub fn namespace(&self, namespace: CacheNamespace) -> Namespace<'_, S> {
        Namespace {
            service: self,
            namespace,
        }
    }

    pub fn flights(&self) -> Namespace<'_, S> {
        self.namespace(CacheNamespace::Flight)
    }

    pub fn pricing(&self) -> Namespace<'_, S> {
        self.namespace(CacheNamespace::Pricing)
    }

    pub fn sessions(&self) -> Namespace<'_, S> {
        self.namespace(CacheNamespace::Session)
    }

    pub fn bookings(&self) -> Namespace<'_, S> {
        self.namespace(CacheNamespace::Booking)
    }

    pub fn driver_locations(&self) -> Namespace<'_, S> {
        self.namespace(CacheNamespace::DriverLocation)
    }

    /// Cached fare table for a zone and fare class (`pricing:{zone}:{class}`).
    pub async fn price<T: DeserializeOwned>(&self, zone: &str, class: &str) -> Option<T> {
        self.get(&CacheNamespace::Pricing.composite_key(&[zone, class]))
            .await
    }

    pub async fn set_price<T: Serialize + ?Sized>(
        &self,
        zone: &str,
        class: &str,
        value: &T,
    ) -> bool {
        self.set(
            &CacheNamespace::Pricing.composite_key(&[zone, class]),
            value,
            CacheNamespace::Pricing.ttl_secs(),
        )
        .await
    }

    /// Cache-aside over `pricing:{zone}:{class}`.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_set_price<T, E, F, Fut>(
        &self,
        zone: &str,
        class: &str,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_set(
            &CacheNamespace::Pricing.composite_key(&[zone, class]),
            CacheNamespace::Pricing.ttl_secs(),
            compute,
        )
        .await
    }

    pub async fn set_driver_location(&self, driver_id: &str, location: &DriverLocation) -> bool {
        self.driver_locations().set(driver_id, location).await
    }

    /// Latest position, or `None` if the driver has not reported within the
    /// namespace TTL.
    pub async fn driver_location(&self, driver_id: &str) -> Option<DriverLocation> {
        self.driver_locations().get(driver_id).await
    }
}
