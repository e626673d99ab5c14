//! Read-query seam between the HTTP routes and the climate data store.
//!
//! Every route reduces to a handful of aggregate or filtered reads. They are
//! collected in the `ClimateStore` trait so the same windowing logic in
//! `climate` runs against PostgreSQL in production and against an in-memory
//! fixture in development and tests.
//!
//! Submodules:
//! - `pg`: pooled PostgreSQL implementation.
//! - `memory`: in-process implementation backed by plain vectors.

pub mod memory;
pub mod pg;

use chrono::NaiveDate;

use crate::model::{StoreError, TemperatureStats};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Read-only access to measurements and stations.
///
/// Implementations are blocking; callers on an async runtime must move
/// calls onto a blocking thread.
pub trait ClimateStore: Send + Sync {
    /// Most recent measurement date, optionally restricted to one station.
    /// `None` when there are no matching measurements.
    fn latest_date(&self, station: Option<&str>) -> Result<Option<NaiveDate>, StoreError>;

    /// `(date, prcp)` for every measurement with `date >= since`.
    fn precipitation_since(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, StoreError>;

    /// Identifier of every station record.
    fn station_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Station with the most measurements. Ties go to the smallest id.
    fn most_active_station(&self) -> Result<Option<String>, StoreError>;

    /// `(date, tobs)` for one station's measurements with `date >= since`.
    fn tobs_since(&self, station: &str, since: NaiveDate)
    -> Result<Vec<(NaiveDate, f64)>, StoreError>;

    /// MIN / AVG / MAX of `tobs` for `start <= date` and, when given,
    /// `date <= end`.
    fn temperature_stats(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureStats, StoreError>;
}
