//! HTTP routes for the pricing engine.

use axum::{extract::State, routing::post, Json, Router};

use crate::availability::default_clock_time;
use crate::error::Result;
use crate::AppState;

use super::requests::QuoteRequest;
use super::responses::QuoteResponse;
use super::services;

/// Pricing API router, mounted under `/api/pricing`.
pub fn router() -> Router<AppState> {
    Router::new().route("/quote", post(calculate_quote))
}

/// Price a rental for the booking form.
async fn calculate_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>> {
    let response = services::quote(
        &request,
        &state.config.pricing_policy,
        default_clock_time(),
        default_clock_time(),
    )?;

    tracing::debug!(
        total_hours = response.breakdown.total_hours,
        total_amount = %response.breakdown.total_amount,
        "Quoted rental"
    );

    Ok(Json(response))
}
