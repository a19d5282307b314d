//! Availability search composition.
//!
//! Fetches units for a validated query, prices every unit for the searched
//! window and orders the result. `SearchSession` adds the per-caller
//! supersession and teardown rules on top.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tracing::{debug, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::pricing::{calculate, PricingError, PricingPolicy};

use super::fetcher::{AvailabilityFetchError, AvailabilityFetcher, AvailabilityWireRequest};
use super::models::{AvailabilityQuery, AvailableUnit, ChangeEvent, PricedUnit, SortOrder};
use super::notifier::{ChangeNotifier, Subscription, AVAILABILITY_TOPIC};

/// Automatic retry of failed availability fetches.
///
/// The default performs no retry; the caller decides what to do on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            min_delay: Duration::from_millis(500),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("availability fetch failed: {0}")]
    Fetch(#[from] AvailabilityFetchError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Turns validated queries into priced, sorted unit lists.
pub struct AvailabilityComposer {
    fetcher: Arc<dyn AvailabilityFetcher>,
    notifier: Arc<dyn ChangeNotifier>,
    policy: PricingPolicy,
    retry: RetryPolicy,
}

impl AvailabilityComposer {
    pub fn new(
        fetcher: Arc<dyn AvailabilityFetcher>,
        notifier: Arc<dyn ChangeNotifier>,
        policy: PricingPolicy,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            policy,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn fetcher(&self) -> &Arc<dyn AvailabilityFetcher> {
        &self.fetcher
    }

    /// Fetch the units matching `query` from the Availability Service.
    pub async fn search(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<Vec<AvailableUnit>, AvailabilityFetchError> {
        let request = AvailabilityWireRequest::from(query);
        let fetch = || async { self.fetcher.fetch_units(&request).await };

        let result = if self.retry.max_retries == 0 {
            fetch().await
        } else {
            fetch
                .retry(
                    ExponentialBuilder::default()
                        .with_min_delay(self.retry.min_delay)
                        .with_max_times(self.retry.max_retries),
                )
                .when(|e: &AvailabilityFetchError| e.should_retry())
                .notify(|e, dur| {
                    warn!(
                        "Availability fetch failed, retrying after {:.2}s: {}",
                        dur.as_secs_f64(),
                        e
                    )
                })
                .await
        };

        match &result {
            Ok(units) => debug!(
                from = %request.date_from,
                to = %request.date_to,
                vehicle_type = ?request.vehicle_type_id,
                units = units.len(),
                "Fetched availability"
            ),
            Err(e) => warn!(error = %e, "Availability fetch failed"),
        }
        result
    }

    /// Price every unit for the query's window and order the result.
    ///
    /// Sorting is stable: units that compare equal keep the service's order.
    pub fn enrich_and_sort(
        &self,
        units: Vec<AvailableUnit>,
        query: &AvailabilityQuery,
        order: SortOrder,
    ) -> Result<Vec<PricedUnit>, PricingError> {
        enrich_and_sort(units, query, order, &self.policy)
    }

    /// Call `on_invalidate` whenever a pushed change touches `query`.
    pub fn subscribe_to_changes<F>(&self, query: &AvailabilityQuery, on_invalidate: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let query = query.clone();
        self.notifier.subscribe(
            AVAILABILITY_TOPIC,
            Arc::new(move |event: &ChangeEvent| {
                if query.is_affected_by(event) {
                    debug!(unit_id = %event.affected_unit_id, "Availability change invalidates search");
                    on_invalidate();
                }
            }),
        )
    }

    /// Open a search session for one caller.
    pub fn session(self: &Arc<Self>) -> SearchSession {
        SearchSession::new(self.clone())
    }
}

/// Price and order units without touching any collaborator.
///
/// A unit whose own data cannot be priced (bad rate from the service) is
/// skipped with a warning; a window that cannot be priced fails the search.
pub fn enrich_and_sort(
    units: Vec<AvailableUnit>,
    query: &AvailabilityQuery,
    order: SortOrder,
    policy: &PricingPolicy,
) -> Result<Vec<PricedUnit>, PricingError> {
    let mut priced = Vec::with_capacity(units.len());
    for unit in units {
        match calculate(&query.rental_request(unit.daily_rate), policy) {
            Ok(price) => priced.push(PricedUnit::new(unit, price)),
            Err(e @ PricingError::InvalidInput { .. }) => {
                warn!(unit_id = %unit.id, error = %e, "Skipping unit that cannot be priced");
            }
            Err(e) => return Err(e),
        }
    }

    match order {
        SortOrder::PriceAsc => priced.sort_by(|a, b| a.price.total_amount.cmp(&b.price.total_amount)),
        SortOrder::PriceDesc => priced.sort_by(|a, b| b.price.total_amount.cmp(&a.price.total_amount)),
        SortOrder::NameAsc => priced.sort_by_cached_key(name_key),
        SortOrder::NameDesc => {
            priced.sort_by_cached_key(|unit| std::cmp::Reverse(name_key(unit)))
        }
    }

    Ok(priced)
}

/// Collation key for brand followed by model.
///
/// Primary: diacritics stripped, lowercase. Secondary: lowercase with
/// diacritics, so "Ecco" and "Écco" still order deterministically.
fn name_key(unit: &PricedUnit) -> (String, String) {
    let name = format!("{}{}", unit.vehicle_type.brand, unit.vehicle_type.model);
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    (folded, name.nfc().collect::<String>().to_lowercase())
}

/// Result of a session search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Latest issued search; safe to display.
    Fresh(Vec<PricedUnit>),
    /// A newer search was issued, or the session closed, before this one finished.
    Superseded,
}

/// Search state owned by a single caller (one results view).
///
/// Each `run` takes a new token; only the run holding the latest token may
/// deliver results, regardless of which response arrives first.
pub struct SearchSession {
    composer: Arc<AvailabilityComposer>,
    latest: AtomicU64,
    closed: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl SearchSession {
    pub fn new(composer: Arc<AvailabilityComposer>) -> Self {
        Self {
            composer,
            latest: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    /// Fetch, price and sort; discards the outcome if superseded meanwhile.
    pub async fn run(
        &self,
        query: &AvailabilityQuery,
        order: SortOrder,
    ) -> Result<SearchOutcome, SearchError> {
        let token = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let fetched = self.composer.search(query).await;

        if !self.is_current(token) {
            debug!(token, "Dropping superseded availability search");
            return Ok(SearchOutcome::Superseded);
        }

        let units = self.composer.enrich_and_sort(fetched?, query, order)?;
        Ok(SearchOutcome::Fresh(units))
    }

    /// Watch for changes relevant to `query`, replacing any previous watch.
    pub fn watch<F>(&self, query: &AvailabilityQuery, on_invalidate: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        // `close` flips the flag before taking this lock, so checking under
        // the lock cannot leave a subscription behind.
        let mut slot = self.lock_subscription();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let previous = slot.replace(self.composer.subscribe_to_changes(query, on_invalidate));
        drop(slot);
        drop(previous);
    }

    /// Tear the session down: unsubscribe and ignore any in-flight search.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let subscription = self.lock_subscription().take();
        drop(subscription);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_current(&self, token: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.latest.load(Ordering::SeqCst) == token
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.subscription.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::sync::oneshot;

    use crate::availability::models::{DateRange, VehicleTypeSummary};
    use crate::availability::notifier::LocalNotifier;
    use crate::availability::query::build_query;
    use crate::availability::testing::unit;

    #[derive(Default)]
    struct FakeFetcher {
        units: Vec<AvailableUnit>,
        failures: Mutex<VecDeque<AvailabilityFetchError>>,
        gates: Mutex<HashMap<NaiveDate, oneshot::Receiver<Vec<AvailableUnit>>>>,
        seen: Mutex<Vec<AvailabilityWireRequest>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn with_units(units: Vec<AvailableUnit>) -> Self {
            Self {
                units,
                ..Default::default()
            }
        }

        fn failing(errors: Vec<AvailabilityFetchError>) -> Self {
            Self {
                failures: Mutex::new(errors.into()),
                ..Default::default()
            }
        }

        /// Hold responses for searches starting on `from` until the sender fires.
        fn gate(&self, from: NaiveDate) -> oneshot::Sender<Vec<AvailableUnit>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(from, rx);
            tx
        }
    }

    #[async_trait]
    impl AvailabilityFetcher for FakeFetcher {
        async fn fetch_units(
            &self,
            request: &AvailabilityWireRequest,
        ) -> Result<Vec<AvailableUnit>, AvailabilityFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());

            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }

            let gate = self.gates.lock().unwrap().remove(&request.date_from);
            match gate {
                Some(rx) => rx
                    .await
                    .map_err(|_| AvailabilityFetchError::Transport("gate dropped".into())),
                None => Ok(self.units.clone()),
            }
        }

        async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleTypeSummary>, AvailabilityFetchError> {
            Ok(vec![])
        }
    }

    fn one_day_query() -> AvailabilityQuery {
        build_query(Some("2024-05-01"), Some("2024-05-02"), None).unwrap()
    }

    fn composer_with(fetcher: FakeFetcher) -> (Arc<AvailabilityComposer>, Arc<FakeFetcher>, LocalNotifier) {
        let fetcher = Arc::new(fetcher);
        let notifier = LocalNotifier::new();
        let composer = AvailabilityComposer::new(
            fetcher.clone(),
            Arc::new(notifier.clone()),
            PricingPolicy::default(),
        );
        (Arc::new(composer), fetcher, notifier)
    }

    fn ids(units: &[PricedUnit]) -> Vec<&str> {
        units.iter().map(|u| u.id.as_str()).collect()
    }

    fn change(range: Option<DateRange>) -> ChangeEvent {
        ChangeEvent {
            affected_unit_id: "u-9".to_string(),
            affected_date_range: range,
            vehicle_type_id: None,
        }
    }

    // ==================== enrich_and_sort ====================

    #[test]
    fn test_price_ascending() {
        let units = vec![
            unit("a", "Honda", "Vision", dec!(50000)),
            unit("b", "Honda", "Wave", dec!(20000)),
            unit("c", "Yamaha", "NVX", dec!(80000)),
        ];
        let priced = enrich_and_sort(units, &one_day_query(), SortOrder::PriceAsc, &PricingPolicy::default()).unwrap();

        let totals: Vec<Decimal> = priced.iter().map(|u| u.price.total_amount).collect();
        assert_eq!(totals, vec![dec!(20000), dec!(50000), dec!(80000)]);
    }

    #[test]
    fn test_price_descending() {
        let units = vec![
            unit("a", "Honda", "Vision", dec!(50000)),
            unit("b", "Honda", "Wave", dec!(20000)),
            unit("c", "Yamaha", "NVX", dec!(80000)),
        ];
        let priced = enrich_and_sort(units, &one_day_query(), SortOrder::PriceDesc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&priced), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_price_ties_keep_service_order() {
        let units = vec![
            unit("first", "Yamaha", "Sirius", dec!(50000)),
            unit("cheap", "Honda", "Wave", dec!(20000)),
            unit("second", "Honda", "Vision", dec!(50000)),
            unit("third", "Suzuki", "Raider", dec!(50000)),
        ];
        let asc = enrich_and_sort(units.clone(), &one_day_query(), SortOrder::PriceAsc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&asc), vec!["cheap", "first", "second", "third"]);

        let desc = enrich_and_sort(units, &one_day_query(), SortOrder::PriceDesc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&desc), vec!["first", "second", "third", "cheap"]);
    }

    #[test]
    fn test_name_sort_is_case_insensitive() {
        let units = vec![
            unit("y", "Yamaha", "Exciter", dec!(1)),
            unit("h", "honda", "Wave", dec!(1)),
            unit("s", "Suzuki", "Raider", dec!(1)),
            unit("h2", "Honda", "Air Blade", dec!(1)),
        ];
        let asc = enrich_and_sort(units.clone(), &one_day_query(), SortOrder::NameAsc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&asc), vec!["h2", "h", "s", "y"]);

        let desc = enrich_and_sort(units, &one_day_query(), SortOrder::NameDesc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&desc), vec!["y", "s", "h", "h2"]);
    }

    #[test]
    fn test_enrich_attaches_breakdown_for_window() {
        let query = build_query(Some("2024-05-01"), Some("2024-05-02"), None)
            .unwrap()
            .with_times(Some("08:00"), Some("12:00"))
            .unwrap();
        let priced = enrich_and_sort(
            vec![unit("a", "Honda", "Vision", dec!(100000))],
            &query,
            SortOrder::PriceAsc,
            &PricingPolicy::default(),
        )
        .unwrap();

        assert_eq!(priced[0].price.total_hours, 28);
        assert_eq!(priced[0].price.total_amount, dec!(160000));
        assert_eq!(priced[0].plate_number, "PL-a");
    }

    #[test]
    fn test_name_sort_folds_accents() {
        let units = vec![
            unit("z", "Zontes", "ZT125", dec!(1)),
            unit("e", "Énergica", "Eva", dec!(1)),
            unit("b", "Benelli", "TNT", dec!(1)),
        ];
        let asc = enrich_and_sort(units.clone(), &one_day_query(), SortOrder::NameAsc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&asc), vec!["b", "e", "z"]);

        let desc = enrich_and_sort(units, &one_day_query(), SortOrder::NameDesc, &PricingPolicy::default()).unwrap();
        assert_eq!(ids(&desc), vec!["z", "e", "b"]);
    }

    #[test]
    fn test_enrich_skips_unit_with_bad_rate() {
        let priced = enrich_and_sort(
            vec![
                unit("a", "Honda", "Vision", dec!(-5)),
                unit("b", "Honda", "Wave", dec!(20000)),
                unit("c", "Yamaha", "NVX", dec!(-0.01)),
            ],
            &one_day_query(),
            SortOrder::PriceAsc,
            &PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(ids(&priced), vec!["b"]);
    }

    #[test]
    fn test_enrich_same_day_default_times_is_invalid_range() {
        let query = build_query(Some("2024-05-01"), Some("2024-05-01"), None).unwrap();
        let result = enrich_and_sort(
            vec![unit("a", "Honda", "Vision", dec!(1))],
            &query,
            SortOrder::PriceAsc,
            &PricingPolicy::default(),
        );
        assert!(matches!(result, Err(PricingError::InvalidRange { .. })));
    }

    #[test]
    fn test_enrich_empty_list() {
        let priced = enrich_and_sort(vec![], &one_day_query(), SortOrder::NameAsc, &PricingPolicy::default()).unwrap();
        assert!(priced.is_empty());
    }

    // ==================== search ====================

    #[tokio::test]
    async fn test_search_sends_default_times() {
        let (composer, fetcher, _) = composer_with(FakeFetcher::with_units(vec![unit("a", "Honda", "Wave", dec!(1))]));
        let query = build_query(Some("2024-05-01"), Some("2024-05-03"), Some("4")).unwrap();

        let units = composer.search(&query).await.unwrap();

        assert_eq!(units.len(), 1);
        let seen = fetcher.seen.lock().unwrap();
        assert_eq!(seen[0].pickup_time, "08:00");
        assert_eq!(seen[0].return_time, "08:00");
        assert_eq!(seen[0].vehicle_type_id.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_search_does_not_retry_by_default() {
        let (composer, fetcher, _) = composer_with(FakeFetcher::failing(vec![
            AvailabilityFetchError::Timeout,
        ]));

        let err = composer.search(&one_day_query()).await.unwrap_err();

        assert_eq!(err, AvailabilityFetchError::Timeout);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_retries_transient_errors_when_configured() {
        let fetcher = Arc::new(FakeFetcher {
            units: vec![unit("a", "Honda", "Wave", dec!(1))],
            failures: Mutex::new(
                vec![
                    AvailabilityFetchError::Transport("reset".into()),
                    AvailabilityFetchError::Http { status: 502, body: String::new() },
                ]
                .into(),
            ),
            ..Default::default()
        });
        let composer = AvailabilityComposer::new(
            fetcher.clone(),
            Arc::new(LocalNotifier::new()),
            PricingPolicy::default(),
        )
        .with_retry(RetryPolicy {
            max_retries: 3,
            min_delay: Duration::from_millis(1),
        });

        let units = composer.search(&one_day_query()).await.unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_does_not_retry_client_errors() {
        let fetcher = Arc::new(FakeFetcher::failing(vec![AvailabilityFetchError::Http {
            status: 400,
            body: "bad dates".into(),
        }]));
        let composer = AvailabilityComposer::new(
            fetcher.clone(),
            Arc::new(LocalNotifier::new()),
            PricingPolicy::default(),
        )
        .with_retry(RetryPolicy {
            max_retries: 3,
            min_delay: Duration::from_millis(1),
        });

        assert!(composer.search(&one_day_query()).await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    // ==================== subscribe_to_changes ====================

    #[test]
    fn test_subscribe_invokes_callback_for_relevant_changes() {
        let (composer, _, notifier) = composer_with(FakeFetcher::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let subscription = composer.subscribe_to_changes(&one_day_query(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let inside = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
        };
        let outside = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
        };
        notifier.publish(AVAILABILITY_TOPIC, &change(Some(inside)));
        notifier.publish(AVAILABILITY_TOPIC, &change(Some(outside)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        notifier.publish(AVAILABILITY_TOPIC, &change(None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 0);
    }

    // ==================== search session ====================

    #[tokio::test]
    async fn test_session_returns_fresh_results() {
        let (composer, _, _) = composer_with(FakeFetcher::with_units(vec![
            unit("a", "Honda", "Wave", dec!(30000)),
            unit("b", "Honda", "Vision", dec!(10000)),
        ]));
        let session = composer.session();

        match session.run(&one_day_query(), SortOrder::PriceAsc).await.unwrap() {
            SearchOutcome::Fresh(units) => assert_eq!(ids(&units), vec!["b", "a"]),
            SearchOutcome::Superseded => panic!("expected fresh results"),
        }
    }

    #[tokio::test]
    async fn test_session_drops_stale_response_arriving_last() {
        let (composer, fetcher, _) = composer_with(FakeFetcher::default());
        let session = composer.session();
        let older = build_query(Some("2024-05-01"), Some("2024-05-02"), None).unwrap();
        let newer = build_query(Some("2024-06-01"), Some("2024-06-02"), None).unwrap();
        let older_tx = fetcher.gate(older.date_range.from);
        let newer_tx = fetcher.gate(newer.date_range.from);

        let older_run = session.run(&older, SortOrder::PriceAsc);
        let newer_run = session.run(&newer, SortOrder::PriceAsc);
        tokio::pin!(older_run);
        tokio::pin!(newer_run);
        assert!(futures::poll!(&mut older_run).is_pending());
        assert!(futures::poll!(&mut newer_run).is_pending());

        newer_tx.send(vec![unit("new", "Honda", "Wave", dec!(1))]).unwrap();
        let newer_outcome = newer_run.await.unwrap();
        older_tx.send(vec![unit("old", "Honda", "Wave", dec!(1))]).unwrap();
        let older_outcome = older_run.await.unwrap();

        assert_eq!(older_outcome, SearchOutcome::Superseded);
        match newer_outcome {
            SearchOutcome::Fresh(units) => assert_eq!(ids(&units), vec!["new"]),
            SearchOutcome::Superseded => panic!("latest search must deliver"),
        }
    }

    #[tokio::test]
    async fn test_session_drops_stale_response_arriving_first() {
        let (composer, fetcher, _) = composer_with(FakeFetcher::default());
        let session = composer.session();
        let older = build_query(Some("2024-05-01"), Some("2024-05-02"), None).unwrap();
        let newer = build_query(Some("2024-06-01"), Some("2024-06-02"), None).unwrap();
        let older_tx = fetcher.gate(older.date_range.from);
        let newer_tx = fetcher.gate(newer.date_range.from);

        let older_run = session.run(&older, SortOrder::PriceAsc);
        let newer_run = session.run(&newer, SortOrder::PriceAsc);
        tokio::pin!(older_run);
        tokio::pin!(newer_run);
        assert!(futures::poll!(&mut older_run).is_pending());
        assert!(futures::poll!(&mut newer_run).is_pending());

        older_tx.send(vec![unit("old", "Honda", "Wave", dec!(1))]).unwrap();
        assert_eq!(older_run.await.unwrap(), SearchOutcome::Superseded);

        newer_tx.send(vec![unit("new", "Honda", "Wave", dec!(1))]).unwrap();
        assert!(matches!(newer_run.await.unwrap(), SearchOutcome::Fresh(_)));
    }

    #[tokio::test]
    async fn test_session_superseded_error_is_discarded() {
        let (composer, fetcher, _) = composer_with(FakeFetcher::default());
        let session = composer.session();
        let older = build_query(Some("2024-05-01"), Some("2024-05-02"), None).unwrap();
        let older_tx = fetcher.gate(older.date_range.from);

        let older_run = session.run(&older, SortOrder::PriceAsc);
        tokio::pin!(older_run);
        assert!(futures::poll!(&mut older_run).is_pending());

        // A newer search that completes immediately
        let fresh = session.run(&one_day_query(), SortOrder::PriceAsc).await.unwrap();
        assert!(matches!(fresh, SearchOutcome::Fresh(_)));

        drop(older_tx);
        assert_eq!(older_run.await.unwrap(), SearchOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_session_surfaces_fetch_error_for_latest_search() {
        let (composer, _, _) = composer_with(FakeFetcher::failing(vec![AvailabilityFetchError::Timeout]));
        let session = composer.session();

        let err = session.run(&one_day_query(), SortOrder::PriceAsc).await.unwrap_err();
        assert_eq!(err, SearchError::Fetch(AvailabilityFetchError::Timeout));
    }

    #[tokio::test]
    async fn test_session_close_ignores_in_flight_and_unsubscribes() {
        let (composer, fetcher, notifier) = composer_with(FakeFetcher::default());
        let session = composer.session();
        let query = one_day_query();
        let tx = fetcher.gate(query.date_range.from);

        session.watch(&query, || {});
        assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 1);

        let run = session.run(&query, SortOrder::PriceAsc);
        tokio::pin!(run);
        assert!(futures::poll!(&mut run).is_pending());

        session.close();
        assert!(session.is_closed());
        assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 0);

        tx.send(vec![unit("a", "Honda", "Wave", dec!(1))]).unwrap();
        assert_eq!(run.await.unwrap(), SearchOutcome::Superseded);

        // Watching after close is a no-op
        session.watch(&query, || {});
        assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 0);
    }

    #[test]
    fn test_session_watch_replaces_previous_subscription() {
        let (composer, _, notifier) = composer_with(FakeFetcher::default());
        let session = composer.session();

        session.watch(&one_day_query(), || {});
        session.watch(&one_day_query(), || {});
        assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 1);

        drop(session);
        assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 0);
    }

    #[test]
    fn test_session_watch_racing_close_leaves_no_listener() {
        let (composer, _, notifier) = composer_with(FakeFetcher::default());
        let query = one_day_query();

        for _ in 0..200 {
            let session = composer.session();
            std::thread::scope(|scope| {
                scope.spawn(|| session.watch(&query, || {}));
                scope.spawn(|| session.close());
            });
            assert_eq!(notifier.listener_count(AVAILABILITY_TOPIC), 0);
        }
    }
}
