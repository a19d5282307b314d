//! Availability search.
//!
//! Normalizes raw search input into a query, fetches matching units from the
//! Availability Service, prices them with the rental pricing engine and
//! relays live "availability changed" pushes so callers can refresh.

pub mod composer;
pub mod fetcher;
pub mod models;
pub mod notifier;
pub mod query;
pub mod routes;

#[cfg(test)]
pub(crate) mod testing;

/// Canonical date format for search input and the wire request.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub use composer::{
    enrich_and_sort, AvailabilityComposer, RetryPolicy, SearchError, SearchOutcome, SearchSession,
};
pub use fetcher::{AvailabilityFetchError, AvailabilityFetcher, HttpAvailabilityFetcher};
pub use models::{AvailabilityQuery, AvailableUnit, ChangeEvent, PricedUnit, SortOrder};
pub use notifier::{ChangeNotifier, LocalNotifier, Subscription, AVAILABILITY_TOPIC};
pub use query::{build_query, default_clock_time};
pub use routes::router;
