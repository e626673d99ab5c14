//! PostgreSQL climate store.
//!
//! Each method checks a connection out of the pool for the duration of a
//! single query; the connection returns to the pool when it drops. All
//! aggregation (MAX, COUNT, MIN, AVG) happens in the database.

use std::error::Error as _;

use chrono::NaiveDate;
use postgres::Row;

use super::ClimateStore;
use crate::db::{PgConnection, PgPool};
use crate::model::{StoreError, TemperatureStats};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn client(&self) -> Result<PgConnection, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// Maps a driver error onto the store taxonomy: a dropped connection or an
/// I/O failure means the store is unavailable, anything else is a query
/// failure.
fn classify(err: postgres::Error) -> StoreError {
    let io_failure = err
        .source()
        .is_some_and(|source| source.is::<std::io::Error>());

    if err.is_closed() || io_failure {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Query(err.to_string())
    }
}

fn column<'a, T: postgres::types::FromSql<'a>>(row: &'a Row, idx: usize) -> Result<T, StoreError> {
    row.try_get(idx).map_err(classify)
}

impl ClimateStore for PgStore {
    fn latest_date(&self, station: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
        let mut client = self.client()?;
        let row = match station {
            Some(station) => client.query_one(
                "SELECT MAX(date) FROM measurement WHERE station = $1",
                &[&station],
            ),
            None => client.query_one("SELECT MAX(date) FROM measurement", &[]),
        }
        .map_err(classify)?;

        column(&row, 0)
    }

    fn precipitation_since(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, StoreError> {
        let mut client = self.client()?;
        let rows = client
            .query(
                "SELECT date, prcp FROM measurement WHERE date >= $1 ORDER BY date",
                &[&since],
            )
            .map_err(classify)?;

        rows.iter()
            .map(|row| -> Result<_, StoreError> { Ok((column(row, 0)?, column(row, 1)?)) })
            .collect()
    }

    fn station_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut client = self.client()?;
        let rows = client
            .query("SELECT station FROM station ORDER BY station", &[])
            .map_err(classify)?;

        rows.iter().map(|row| column(row, 0)).collect()
    }

    fn most_active_station(&self) -> Result<Option<String>, StoreError> {
        let mut client = self.client()?;
        let row = client
            .query_opt(
                "SELECT station, COUNT(*) AS readings
                 FROM measurement
                 GROUP BY station
                 ORDER BY readings DESC, station ASC
                 LIMIT 1",
                &[],
            )
            .map_err(classify)?;

        row.map(|row| column(&row, 0)).transpose()
    }

    fn tobs_since(
        &self,
        station: &str,
        since: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, StoreError> {
        let mut client = self.client()?;
        let rows = client
            .query(
                "SELECT date, tobs FROM measurement
                 WHERE station = $1 AND date >= $2
                 ORDER BY date",
                &[&station, &since],
            )
            .map_err(classify)?;

        rows.iter()
            .map(|row| -> Result<_, StoreError> { Ok((column(row, 0)?, column(row, 1)?)) })
            .collect()
    }

    fn temperature_stats(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<TemperatureStats, StoreError> {
        let mut client = self.client()?;
        let row = match end {
            Some(end) => client.query_one(
                "SELECT MIN(tobs), AVG(tobs), MAX(tobs) FROM measurement
                 WHERE date >= $1 AND date <= $2",
                &[&start, &end],
            ),
            None => client.query_one(
                "SELECT MIN(tobs), AVG(tobs), MAX(tobs) FROM measurement
                 WHERE date >= $1",
                &[&start],
            ),
        }
        .map_err(classify)?;

        Ok(TemperatureStats {
            min: column(&row, 0)?,
            avg: column(&row, 1)?,
            max: column(&row, 2)?,
        })
    }
}
