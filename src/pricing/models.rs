//! Value objects for rental pricing.
//!
//! All of these are built fresh for a single calculation and never mutated.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::services::PricingError;

/// Canonical clock-time format for pickup and return times (24h).
pub const CLOCK_TIME_FORMAT: &str = "%H:%M";

/// Late fee charged per overage hour, in currency minor units.
pub const LATE_FEE_PER_HOUR: Decimal = dec!(15000);

/// Overage hours above this threshold are billed as a full extra day.
pub const GRACE_HOURS: i64 = 6;

/// Parse an `HH:MM` clock time.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, PricingError> {
    NaiveTime::parse_from_str(raw.trim(), CLOCK_TIME_FORMAT).map_err(|_| {
        PricingError::InvalidInput {
            field: "time".to_string(),
            message: format!("'{}' is not a valid HH:MM time", raw),
        }
    })
}

/// Tunable billing constants injected into the calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    pub late_fee_per_hour: Decimal,
    pub grace_hours: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            late_fee_per_hour: LATE_FEE_PER_HOUR,
            grace_hours: GRACE_HOURS,
        }
    }
}

/// A single rental to be priced.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalRequest {
    pub daily_rate: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub return_time: NaiveTime,
}

impl RentalRequest {
    pub fn start_instant(&self) -> NaiveDateTime {
        self.start_date.and_time(self.pickup_time)
    }

    pub fn end_instant(&self) -> NaiveDateTime {
        self.end_date.and_time(self.return_time)
    }
}

/// Result of a rental price calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBreakdown {
    pub total_hours: i64,
    pub full_days: i64,
    pub overage_hours: i64,
    pub is_late: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub penalty_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
}
