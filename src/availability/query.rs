//! Raw search input normalization.
//!
//! Incomplete input is an expected state while the user is still picking
//! dates, so nothing here returns an error: bad input yields `None` and a
//! warning in the log.

use chrono::{NaiveDate, NaiveTime};
use tracing::warn;

use crate::pricing::parse_clock_time;

use super::models::{AvailabilityQuery, DateRange};
use super::DATE_FORMAT;

/// Sentinel the type filter sends for "every vehicle type".
pub const ALL_TYPES: &str = "all";

/// Default pickup and return clock time (08:00).
pub fn default_clock_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Build a canonical query from raw search input.
///
/// Returns `None` when either date is missing, not `YYYY-MM-DD`, or when the
/// range is reversed. A type id of `"all"` or blank means no type filter.
pub fn build_query(
    raw_from: Option<&str>,
    raw_to: Option<&str>,
    raw_type_id: Option<&str>,
) -> Option<AvailabilityQuery> {
    let from = parse_date("from", raw_from)?;
    let to = parse_date("to", raw_to)?;

    if to < from {
        warn!(%from, %to, "Ignoring availability search with reversed date range");
        return None;
    }

    Some(AvailabilityQuery {
        date_range: DateRange { from, to },
        vehicle_type_id: normalize_type_id(raw_type_id),
        pickup_time: default_clock_time(),
        return_time: default_clock_time(),
    })
}

impl AvailabilityQuery {
    /// Override the default pickup/return times.
    ///
    /// Blank values keep the current time; malformed values drop the query.
    pub fn with_times(mut self, pickup: Option<&str>, ret: Option<&str>) -> Option<Self> {
        if let Some(raw) = pickup.filter(|s| !s.trim().is_empty()) {
            self.pickup_time = parse_time("pickup_time", raw)?;
        }
        if let Some(raw) = ret.filter(|s| !s.trim().is_empty()) {
            self.return_time = parse_time("return_time", raw)?;
        }
        Some(self)
    }
}

fn parse_date(field: &str, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        warn!(field, "Availability search is missing a date");
        return None;
    };

    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(field, value = raw, error = %e, "Ignoring unparsable availability date");
            None
        }
    }
}

fn parse_time(field: &str, raw: &str) -> Option<NaiveTime> {
    match parse_clock_time(raw) {
        Ok(time) => Some(time),
        Err(e) => {
            warn!(field, error = %e, "Ignoring unparsable availability time");
            None
        }
    }
}

fn normalize_type_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(ALL_TYPES))
        .map(str::to_string)
}
