//! Service configuration.
//!
//! Settings are read from a TOML file (default `climate.toml`) and then
//! overridden from the environment, so the database password can live in
//! `.env` rather than in a checked-in file:
//!
//! | Variable            | Overrides            |
//! |---------------------|----------------------|
//! | `DATABASE_URL`      | `database.url`       |
//! | `CLIMATE_BIND`      | `server.bind`        |
//! | `CLIMATE_LOG_LEVEL` | `logging.level`      |
//!
//! Every field has a default, so an absent file yields a working
//! configuration for a local database.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::logging::LogLevel;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "climate.toml";

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "CLIMATE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:5000`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// How long a request waits for a pooled connection before the store is
    /// reported unavailable.
    pub connect_timeout_secs: u64,
    /// Serve this JSON fixture from memory instead of connecting to
    /// PostgreSQL.
    pub fixture: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://climate@localhost/climate".to_string(),
            pool_size: 8,
            connect_timeout_secs: 5,
            fixture: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Also append log lines to this file.
    pub log_file: Option<PathBuf>,
    /// Include timestamps in console output.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_file: None,
            timestamps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads the effective configuration.
    ///
    /// Path resolution: `explicit`, then `$CLIMATE_CONFIG`, then
    /// `climate.toml` if it exists, then built-in defaults. A path that was
    /// named explicitly (argument or variable) must exist.
    /// `env` is the variable lookup, normally `|k| std::env::var(k).ok()`.
    pub fn resolve<F>(explicit: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = explicit.or_else(|| env(CONFIG_PATH_VAR).map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(bind) = env("CLIMATE_BIND") {
            self.server.bind = bind;
        }
        if let Some(level) = env("CLIMATE_LOG_LEVEL") {
            self.logging.level = level.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.database.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.database.fixture.is_none() && self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database.url is empty and no fixture is configured".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind.parse().map_err(|e| {
            ConfigError::Invalid(format!("server.bind {:?}: {}", self.server.bind, e))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [database]
            url = "postgres://reader@db.internal/hawaii"

            [logging]
            level = "debug"
            timestamps = false
            "#,
        )
        .unwrap();
        assert_eq!(config.database.url, "postgres://reader@db.internal/hawaii");
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(!config.logging.timestamps);
        assert_eq!(config.server.bind, "127.0.0.1:5000");
    }

    #[test]
    fn test_unknown_level_is_a_parse_error() {
        let result = Config::from_toml_str("[logging]\nlevel = \"verbose\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env_from(&[
                ("DATABASE_URL", "postgres://other/db"),
                ("CLIMATE_BIND", "0.0.0.0:8080"),
                ("CLIMATE_LOG_LEVEL", "warn"),
            ]))
            .unwrap();
        assert_eq!(config.database.url, "postgres://other/db");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.logging.level, LogLevel::Warning);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.database.pool_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.server.bind = "localhost".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_resolve_reads_named_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind = \"127.0.0.1:9999\"").unwrap();

        let config = Config::resolve(
            None,
            env_from(&[(CONFIG_PATH_VAR, file.path().to_str().unwrap())]),
        )
        .unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 9999);
    }

    #[test]
    fn test_resolve_missing_named_file_fails() {
        let result = Config::resolve(Some(PathBuf::from("/nonexistent/climate.toml")), |_| None);
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
