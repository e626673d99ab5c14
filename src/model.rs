//! Core data types for the climate query service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the two read-only entities (measurements and stations), the values the
//! HTTP routes return, and the error types raised by the store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Calendar date format used in paths, JSON keys and fixtures.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Body text returned for any path date that fails to parse.
pub const DATE_FORMAT_ERROR: &str = "Date format must be YYYY-MM-DD";

/// Length of the "last year" window, in days.
pub const ONE_YEAR_DAYS: i64 = 365;

/// Parses a `YYYY-MM-DD` string. Out-of-range components (month 13,
/// February 30) are rejected the same way as malformed text.
///
/// chrono's `%Y` accepts a sign and `%m`/`%d` accept single digits or
/// leading spaces, so the shape is checked first.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if !is_iso_date_shape(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// Exactly four digits, dash, two digits, dash, two digits.
fn is_iso_date_shape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// One station's observation for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub station: String,
    pub date: NaiveDate,
    /// Precipitation, in inches. Missing on days the gauge did not report.
    pub prcp: Option<f64>,
    /// Temperature observation, in degrees Fahrenheit.
    pub tobs: f64,
}

/// A weather station. Measurements reference it by `station`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub station: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// MIN / AVG / MAX of `tobs` over a date range.
///
/// Every field is `None` when no measurement falls inside the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TemperatureStats {
    #[serde(rename = "TMIN")]
    pub min: Option<f64>,
    #[serde(rename = "TAVG")]
    pub avg: Option<f64>,
    #[serde(rename = "TMAX")]
    pub max: Option<f64>,
}

/// A date-keyed series as returned by `/precipitation` and `/tobs`.
///
/// Serializes as a JSON object with `YYYY-MM-DD` keys in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateSeries(pub BTreeMap<NaiveDate, Option<f64>>);

impl DateSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<Option<f64>> {
        self.0.get(&date).copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }
}

impl Serialize for DateSeries {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, value) in &self.0 {
            map.serialize_entry(&date.format(DATE_FORMAT).to_string(), value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while reading from the climate data store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No connection could be obtained, or the connection dropped mid-query.
    #[error("data store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected the query or returned data we could not decode.
    #[error("query failed: {0}")]
    Query(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
