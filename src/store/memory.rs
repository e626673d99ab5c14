//! In-process climate store.
//!
//! Holds stations and measurements in plain vectors and answers the same
//! reads as the PostgreSQL store. Used to serve a JSON fixture when no
//! database is configured, and as the backing store for route tests.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use super::ClimateStore;
use crate::model::{Measurement, Station, StoreError, TemperatureStats};

/// Errors raised while loading a fixture document.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    stations: Vec<Station>,
    #[serde(default)]
    measurements: Vec<Measurement>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stations: Vec<Station>,
    measurements: Vec<Measurement>,
}

impl MemoryStore {
    pub fn new(stations: Vec<Station>, measurements: Vec<Measurement>) -> Self {
        Self {
            stations,
            measurements,
        }
    }

    /// Parses a fixture document:
    /// `{"stations": [...], "measurements": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Ok(Self::new(fixture.stations, fixture.measurements))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }
}

impl ClimateStore for MemoryStore {
    fn latest_date(&self, station: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self
            .measurements
            .iter()
            .filter(|m| station.is_none_or(|s| m.station == s))
            .map(|m| m.date)
            .max())
    }

    fn precipitation_since(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, StoreError> {
        Ok(self
            .measurements
            .iter()
            .filter(|m| m.date >= since)
            .map(|m| (m.date, m.prcp))
            .collect())
    }

    fn station_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.stations.iter().map(|s| s.station.clone()).collect();
        ids.sort();
        Ok(ids)
    }

    fn most_active_station(&self) -> Result<Option<String>, StoreError> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for m in &self.measurements {
            *counts.entry(m.station.as_str()).or_default() += 1;
        }

        // Highest count first, then the smallest id.
        Ok(counts
            .into_iter()
            .min_by(|(a_id, a_n), (b_id, b_n)| b_n.cmp(a_n).then_with(|| a_id.cmp(b_id)))
            .map(|(id, _)| id.to_string()))
    }

    fn tobs_since(
        &self,
        station: &str,
        since: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, StoreError> {
        Ok(self
            .measurements
            .iter()
            .filter(|m| m.station == station && m.date >= since)
            .map(|m| (m.date, m.tobs))
            .collect())
    }

    fn temperature_stats(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureStats, StoreError> {
        let temps: Vec<f64> = self
            .measurements
            .iter()
            .filter(|m| m.date >= start && end.is_none_or(|e| m.date <= e))
            .map(|m| m.tobs)
            .collect();

        if temps.is_empty() {
            return Ok(TemperatureStats::default());
        }

        let sum: f64 = temps.iter().sum();
        Ok(TemperatureStats {
            min: temps.iter().copied().reduce(f64::min),
            avg: Some(sum / temps.len() as f64),
            max: temps.iter().copied().reduce(f64::max),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
