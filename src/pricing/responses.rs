//! Response DTOs for pricing API endpoints.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::models::PriceBreakdown;

/// Response for a rental quote
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Generic error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
