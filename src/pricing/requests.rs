//! Request DTOs for pricing API endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Request to price a rental
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub daily_rate: Decimal,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub pickup_time: Option<String>,
    #[serde(default)]
    pub return_time: Option<String>,
}
