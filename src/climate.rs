//! Date windowing and aggregation behind the HTTP routes.
//!
//! Each function here is one route's worth of store reads. The store does
//! the heavy lifting (MAX, COUNT, MIN, AVG); this module decides which
//! window to ask for and folds the returned rows into response values.
//!
//! # Duplicate dates
//! `/precipitation` spans every station, so several rows routinely share a
//! date. Rows sharing a date are averaged over their non-null values; a date
//! whose values are all null maps to `null`. The same rule applies to
//! `/tobs`, where a duplicate would mean the store holds two readings for
//! one station and day.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::model::{DateSeries, ONE_YEAR_DAYS, StoreError, TemperatureStats};
use crate::store::ClimateStore;

// ---------------------------------------------------------------------------
// Window helpers
// ---------------------------------------------------------------------------

/// First date of the one-year window ending at `last_date`.
///
/// The window is `[last_date - 365 days, last_date]`, inclusive on both ends.
pub fn one_year_before(last_date: NaiveDate) -> NaiveDate {
    last_date
        .checked_sub_days(Days::new(ONE_YEAR_DAYS as u64))
        .unwrap_or(NaiveDate::MIN)
}

/// Folds `(date, value)` rows into a date-keyed series, averaging rows that
/// share a date.
pub fn collapse_by_date<I>(rows: I) -> DateSeries
where
    I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
{
    let mut sums: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
    for (date, value) in rows {
        let entry = sums.entry(date).or_insert((0.0, 0));
        if let Some(v) = value {
            entry.0 += v;
            entry.1 += 1;
        }
    }

    DateSeries(
        sums.into_iter()
            .map(|(date, (sum, n))| (date, (n > 0).then(|| sum / f64::from(n))))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Route queries
// ---------------------------------------------------------------------------

/// Precipitation for the last year of data across all stations.
///
/// Returns an empty series when the store holds no measurements.
pub fn last_year_precipitation(store: &dyn ClimateStore) -> Result<DateSeries, StoreError> {
    let Some(last_date) = store.latest_date(None)? else {
        return Ok(DateSeries::default());
    };

    let since = one_year_before(last_date);
    tracing::debug!(%last_date, %since, "precipitation window");

    let rows = store.precipitation_since(since)?;
    Ok(collapse_by_date(rows))
}

/// Identifiers of every station, in lexicographic order.
pub fn station_ids(store: &dyn ClimateStore) -> Result<Vec<String>, StoreError> {
    let mut ids = store.station_ids()?;
    ids.sort();
    Ok(ids)
}

/// Temperature observations for the last year of the most active station's
/// data.
///
/// Returns an empty series when the store holds no measurements.
pub fn most_active_station_tobs(store: &dyn ClimateStore) -> Result<DateSeries, StoreError> {
    let Some(station) = store.most_active_station()? else {
        return Ok(DateSeries::default());
    };
    let Some(last_date) = store.latest_date(Some(&station))? else {
        return Ok(DateSeries::default());
    };

    let since = one_year_before(last_date);
    tracing::debug!(%station, %last_date, %since, "tobs window");

    let rows = store.tobs_since(&station, since)?;
    Ok(collapse_by_date(
        rows.into_iter().map(|(date, tobs)| (date, Some(tobs))),
    ))
}

/// MIN / AVG / MAX temperature from `start` onward, or within
/// `[start, end]` when `end` is given.
///
/// `end < start` is not an error; it selects nothing and every field is
/// `None`.
pub fn temperature_range(
    store: &dyn ClimateStore,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<TemperatureStats, StoreError> {
    store.temperature_stats(start, end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
