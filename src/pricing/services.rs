//! Pricing service functions.
//!
//! Turns raw quote input (strings from the booking form) into a validated
//! `RentalRequest` and runs it through the calculator.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use super::calculators::calculate;
use super::models::{parse_clock_time, PricingPolicy, RentalRequest};
use super::requests::QuoteRequest;
use super::responses::QuoteResponse;

/// Pricing calculation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    /// Caller bug: negative rate, malformed time or date string.
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Return instant is not after the pickup instant.
    #[error("Return time {end} must be after pickup time {start}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl PricingError {
    pub fn error_type(&self) -> &'static str {
        match self {
            PricingError::InvalidInput { .. } => "invalid_input",
            PricingError::InvalidRange { .. } => "invalid_range",
        }
    }
}

/// Price a quote request, filling in missing pickup/return times with defaults.
pub fn quote(
    request: &QuoteRequest,
    policy: &PricingPolicy,
    default_pickup: NaiveTime,
    default_return: NaiveTime,
) -> Result<QuoteResponse, PricingError> {
    let rental = resolve_request(request, default_pickup, default_return)?;
    let breakdown = calculate(&rental, policy)?;

    Ok(QuoteResponse {
        breakdown,
        start: rental.start_instant(),
        end: rental.end_instant(),
    })
}

/// Parse the raw dates and times of a quote request into a `RentalRequest`.
pub fn resolve_request(
    request: &QuoteRequest,
    default_pickup: NaiveTime,
    default_return: NaiveTime,
) -> Result<RentalRequest, PricingError> {
    Ok(RentalRequest {
        daily_rate: request.daily_rate,
        start_date: parse_date("start_date", &request.start_date)?,
        end_date: parse_date("end_date", &request.end_date)?,
        pickup_time: match request.pickup_time.as_deref() {
            Some(raw) => parse_clock_time(raw)?,
            None => default_pickup,
        },
        return_time: match request.return_time.as_deref() {
            Some(raw) => parse_clock_time(raw)?,
            None => default_return,
        },
    })
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, PricingError> {
    NaiveDate::parse_from_str(raw.trim(), crate::availability::DATE_FORMAT).map_err(|_| {
        PricingError::InvalidInput {
            field: field.to_string(),
            message: format!("'{}' is not a valid YYYY-MM-DD date", raw),
        }
    })
}
