//! Canned `AvailabilityFetcher` and app state shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::fetcher::{AvailabilityFetchError, AvailabilityFetcher, AvailabilityWireRequest};
use crate::config::Config;
use crate::AppState;

use super::models::{AvailableUnit, UnitStatus, VehicleType, VehicleTypeSummary};

#[derive(Default)]
pub struct StaticFetcher {
    pub units: Vec<AvailableUnit>,
    pub types: Vec<VehicleTypeSummary>,
    pub error: Option<AvailabilityFetchError>,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with_units(units: Vec<AvailableUnit>) -> Self {
        Self {
            units,
            ..Default::default()
        }
    }

    pub fn failing(error: AvailabilityFetchError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilityFetcher for StaticFetcher {
    async fn fetch_units(
        &self,
        _request: &AvailabilityWireRequest,
    ) -> Result<Vec<AvailableUnit>, AvailabilityFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.units.clone()),
        }
    }

    async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleTypeSummary>, AvailabilityFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.types.clone()),
        }
    }
}

pub fn unit(id: &str, brand: &str, model: &str, rate: Decimal) -> AvailableUnit {
    AvailableUnit {
        id: id.to_string(),
        plate_number: format!("PL-{id}"),
        daily_rate: rate,
        status: UnitStatus::Available,
        vehicle_type: VehicleType {
            brand: brand.to_string(),
            model: model.to_string(),
            cc: 125,
        },
    }
}

/// App state with default configuration backed by `fetcher`.
pub fn test_state(fetcher: Arc<dyn AvailabilityFetcher>) -> AppState {
    let config = Config::from_lookup(|key| {
        (key == "AVAILABILITY_API_URL").then(|| "http://127.0.0.1:9".to_string())
    })
    .unwrap();
    AppState::new(config, fetcher)
}
