//! HTTP routes for availability search and live change pushes.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::AppState;

use super::models::{
    AvailabilityQuery, BookingPayload, ChangeEvent, PricedUnit, SortOrder, VehicleTypeSummary,
};
use super::notifier::AVAILABILITY_TOPIC;
use super::query::build_query;

/// Availability API router (full paths, merged at the root).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/availability", get(search))
        .route("/api/availability/stream", get(stream_changes))
        .route("/api/availability/events", post(publish_change))
        .route("/api/vehicle-types", get(vehicle_types))
}

/// Raw search parameters as entered on the search form
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
    pub sort: Option<String>,
    pub pickup_time: Option<String>,
    pub return_time: Option<String>,
}

impl SearchParams {
    /// Validated query, or `None` while the search is incomplete.
    fn query(&self) -> Option<AvailabilityQuery> {
        build_query(
            self.from.as_deref(),
            self.to.as_deref(),
            self.vehicle_type.as_deref(),
        )?
        .with_times(self.pickup_time.as_deref(), self.return_time.as_deref())
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// False when the parameters did not form a complete search
    pub ready: bool,
    pub units: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub unit: PricedUnit,
    pub booking: BookingPayload,
}

/// Search available units, priced and sorted for the requested window.
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let Some(query) = params.query() else {
        return Ok(Json(SearchResponse {
            ready: false,
            units: Vec::new(),
        }));
    };
    let order = SortOrder::from_param(params.sort.as_deref());

    let units = state.composer.search(&query).await?;
    let priced = state.composer.enrich_and_sort(units, &query, order)?;

    let units = priced
        .into_iter()
        .map(|unit| SearchResult {
            booking: unit.booking_payload(&query),
            unit,
        })
        .collect();

    Ok(Json(SearchResponse { ready: true, units }))
}

/// Server-sent `invalidate` events for changes touching the given search.
///
/// The subscription lives as long as the response stream and is dropped
/// when the client disconnects.
async fn stream_changes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let query = params.query().ok_or_else(|| {
        AppError::Validation("A complete search (from, to) is required to watch changes".into())
    })?;

    // Capacity 1: a pending invalidation already covers any later ones.
    let (tx, rx) = mpsc::channel::<()>(1);
    let subscription = state.composer.subscribe_to_changes(&query, move || {
        let _ = tx.try_send(());
    });
    tracing::debug!(subscription = %subscription.id(), "Client watching availability");

    let events = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        rx.recv().await?;
        let event = Event::default().event("invalidate").data("availability changed");
        Some((Ok::<_, Infallible>(event), (rx, subscription)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Intake for availability change notifications from the backend.
async fn publish_change(
    State(state): State<AppState>,
    Json(event): Json<ChangeEvent>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    if event.affected_unit_id.trim().is_empty() {
        return Err(AppError::Validation("affectedUnitId is required".into()));
    }

    let listeners = state.notifier.publish(AVAILABILITY_TOPIC, &event);
    tracing::info!(
        unit_id = %event.affected_unit_id,
        listeners,
        "Availability change published"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "listeners": listeners })),
    ))
}

/// Vehicle-type catalog for the search filter.
async fn vehicle_types(State(state): State<AppState>) -> Result<Json<Vec<VehicleTypeSummary>>> {
    let types = state
        .cache
        .vehicle_types(state.composer.fetcher().as_ref())
        .await?;
    Ok(Json(types.as_ref().clone()))
}
