//! In-memory caching using moka
//!
//! Only catalog data is cached here. Availability results are never cached:
//! every search goes to the Availability Service.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::availability::fetcher::{AvailabilityFetchError, AvailabilityFetcher};
use crate::availability::models::VehicleTypeSummary;

const VEHICLE_TYPES_KEY: &str = "vehicle_types";

/// Application cache holding the vehicle-type catalog
#[derive(Clone)]
pub struct AppCache {
    /// Vehicle types for the search filter (single entry)
    pub vehicle_types: Cache<String, Arc<Vec<VehicleTypeSummary>>>,
}

impl AppCache {
    /// Create a new cache instance with the given catalog TTL
    pub fn new(vehicle_types_ttl: Duration) -> Self {
        Self {
            vehicle_types: Cache::builder()
                .max_capacity(1)
                .time_to_live(vehicle_types_ttl)
                .build(),
        }
    }

    /// Vehicle-type catalog, fetched on a cache miss.
    pub async fn vehicle_types(
        &self,
        fetcher: &dyn AvailabilityFetcher,
    ) -> Result<Arc<Vec<VehicleTypeSummary>>, AvailabilityFetchError> {
        if let Some(cached) = self.vehicle_types.get(VEHICLE_TYPES_KEY).await {
            debug!("Cache HIT for vehicle types");
            return Ok(cached);
        }

        debug!("Cache MISS for vehicle types");
        let types = Arc::new(fetcher.fetch_vehicle_types().await?);
        self.vehicle_types
            .insert(VEHICLE_TYPES_KEY.to_string(), types.clone())
            .await;
        Ok(types)
    }

    /// Cache statistics reported by `/health`
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            vehicle_types_cached: self.vehicle_types.entry_count() > 0,
        }
    }

}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(10 * 60))
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub vehicle_types_cached: bool,
}
