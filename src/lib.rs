//! Read-only HTTP API over weather station precipitation and temperature
//! observations.
//!
//! - `model`: measurements, stations, query results, store errors.
//! - `store`: the `ClimateStore` read seam and its PostgreSQL and
//!   in-memory implementations.
//! - `climate`: date windowing and aggregation for each route.
//! - `api`: axum router, handlers, error responses.
//! - `config`, `logging`, `db`: startup plumbing.

pub mod api;
pub mod climate;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;
