//! PostgreSQL connection pool construction and startup checks.
//!
//! The service never creates or migrates tables; `sql/001_base_schema.sql`
//! documents the layout it expects. At startup `connect_and_verify` builds
//! the pool and confirms the required tables exist so a misconfigured
//! database fails loudly instead of on the first request.

use std::time::Duration;

use postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;

use crate::config::DatabaseConfig;

/// Pooled PostgreSQL connections shared by all request handlers.
pub type PgPool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

/// A connection checked out of `PgPool`; returned to the pool on drop.
pub type PgConnection = r2d2::PooledConnection<PostgresConnectionManager<NoTls>>;

/// Tables every deployment must provide.
pub const REQUIRED_TABLES: &[&str] = &["measurement", "station"];

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[source] postgres::Error),
    #[error("could not open connection pool: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("schema check failed: {0}")]
    Query(#[from] postgres::Error),
    #[error("missing tables: {}. Apply sql/001_base_schema.sql to the database.", .0.join(", "))]
    MissingTables(Vec<String>),
}

/// Builds a pool from the `[database]` section.
///
/// Blocks until the pool's initial connections are established or the
/// connect timeout expires.
pub fn build_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let pg_config: postgres::Config = config.url.parse().map_err(DbError::InvalidUrl)?;
    let manager = PostgresConnectionManager::new(pg_config, NoTls);

    let pool = r2d2::Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build(manager)?;
    Ok(pool)
}

/// Returns the subset of `tables` absent from the current schema search path.
pub fn missing_tables(pool: &PgPool, tables: &[&str]) -> Result<Vec<String>, DbError> {
    let mut client = pool.get()?;
    let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();

    let rows = client.query(
        "SELECT table_name::text
         FROM information_schema.tables
         WHERE table_schema::name = ANY(current_schemas(false))
           AND table_name::text = ANY($1::text[])",
        &[&names],
    )?;
    let present: Vec<String> = rows.iter().map(|row| row.get(0)).collect();

    Ok(names.into_iter().filter(|t| !present.contains(t)).collect())
}

/// Builds the pool and verifies that every table in `tables` exists.
pub fn connect_and_verify(config: &DatabaseConfig, tables: &[&str]) -> Result<PgPool, DbError> {
    let pool = build_pool(config)?;

    let missing = missing_tables(&pool, tables)?;
    if !missing.is_empty() {
        return Err(DbError::MissingTables(missing));
    }

    tracing::info!(
        pool_size = config.pool_size,
        "connected to climate database"
    );
    Ok(pool)
}
