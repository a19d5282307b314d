//! Motorcycle rental web service.
//!
//! Prices rentals with the hourly grace rule and serves availability
//! searches composed from the backend Availability Service.

pub mod availability;
pub mod cache;
pub mod config;
pub mod error;
pub mod pricing;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::availability::{AvailabilityComposer, AvailabilityFetcher, LocalNotifier};
use crate::cache::AppCache;
use crate::config::Config;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub composer: Arc<AvailabilityComposer>,
    pub notifier: LocalNotifier,
    pub cache: AppCache,
}

impl AppState {
    pub fn new(config: Config, fetcher: Arc<dyn AvailabilityFetcher>) -> Self {
        let notifier = LocalNotifier::default();
        let composer = AvailabilityComposer::new(
            fetcher,
            Arc::new(notifier.clone()),
            config.pricing_policy,
        )
        .with_retry(config.retry_policy);
        let cache = AppCache::new(config.vehicle_types_ttl);

        Self {
            config: Arc::new(config),
            composer: Arc::new(composer),
            notifier,
            cache,
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/pricing", pricing::router())
        .merge(availability::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "cache": state.cache.stats() }))
}
