//! Availability search models.
//!
//! Wire shapes of the Availability Service use camelCase; everything we
//! serialize back to the front-end keeps snake_case like the pricing DTOs.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::models::CLOCK_TIME_FORMAT;
use crate::pricing::{PriceBreakdown, RentalRequest};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }
}

/// Validated availability search.
///
/// Only produced by `build_query`; an incomplete search has no query at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub date_range: DateRange,
    pub vehicle_type_id: Option<String>,
    pub pickup_time: NaiveTime,
    pub return_time: NaiveTime,
}

impl AvailabilityQuery {
    /// Pricing input for a unit renting over this query's window.
    pub fn rental_request(&self, daily_rate: Decimal) -> RentalRequest {
        RentalRequest {
            daily_rate,
            start_date: self.date_range.from,
            end_date: self.date_range.to,
            pickup_time: self.pickup_time,
            return_time: self.return_time,
        }
    }

    /// Whether a pushed change could alter this query's results.
    ///
    /// An event without a date range or vehicle type is treated as touching
    /// every range or type respectively.
    pub fn is_affected_by(&self, event: &ChangeEvent) -> bool {
        let dates_overlap = event
            .affected_date_range
            .map_or(true, |range| range.overlaps(&self.date_range));

        let type_matches = match (&self.vehicle_type_id, &event.vehicle_type_id) {
            (Some(wanted), Some(changed)) => wanted == changed,
            _ => true,
        };

        dates_overlap && type_matches
    }
}

/// Unit status as reported by the Availability Service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Available,
    Rented,
    Reserved,
    Unavailable,
}

/// Vehicle model details attached to a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleType {
    pub brand: String,
    pub model: String,
    pub cc: u32,
}

/// Physical motorcycle returned by the Availability Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableUnit {
    pub id: String,
    pub plate_number: String,
    pub daily_rate: Decimal,
    pub status: UnitStatus,
    pub vehicle_type: VehicleType,
}

/// Entry of the vehicle-type catalog used by the search filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleTypeSummary {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub cc: u32,
}

/// Unit together with its price for the searched window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedUnit {
    pub id: String,
    pub plate_number: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub daily_rate: Decimal,
    pub status: UnitStatus,
    pub vehicle_type: VehicleType,
    pub price: PriceBreakdown,
}

impl PricedUnit {
    pub fn new(unit: AvailableUnit, price: PriceBreakdown) -> Self {
        Self {
            id: unit.id,
            plate_number: unit.plate_number,
            daily_rate: unit.daily_rate,
            status: unit.status,
            vehicle_type: unit.vehicle_type,
            price,
        }
    }

    /// Booking payload for this unit over the searched window.
    pub fn booking_payload(&self, query: &AvailabilityQuery) -> BookingPayload {
        BookingPayload {
            vehicle_id: self.id.clone(),
            start_date: query.date_range.from,
            end_date: query.date_range.to,
            pickup_time: query.pickup_time.format(CLOCK_TIME_FORMAT).to_string(),
            return_time: query.return_time.format(CLOCK_TIME_FORMAT).to_string(),
            total_amount: self.price.total_amount,
        }
    }
}

/// Body the booking form submits to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub vehicle_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pickup_time: String,
    pub return_time: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
}

/// Ordering applied to priced search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    /// Parse a `sort` query value, falling back to the default for unknown input.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("price_desc") => SortOrder::PriceDesc,
            Some("name_asc") | Some("name") => SortOrder::NameAsc,
            Some("name_desc") => SortOrder::NameDesc,
            _ => SortOrder::PriceAsc,
        }
    }
}

/// Push notification that server-side availability changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub affected_unit_id: String,
    #[serde(default)]
    pub affected_date_range: Option<DateRange>,
    #[serde(default)]
    pub vehicle_type_id: Option<String>,
}
