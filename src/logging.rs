//! Structured logging for the climate query service
//!
//! Console output plus an optional log file for daemon operation.
//! `RUST_LOG` overrides the configured level.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::model::StoreError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Level name as understood by `EnvFilter` directives.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("log file path {0} has no file name")]
    BadPath(String),
    #[error("failed to create log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("logger already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber.
///
/// Returns the file writer's guard when a log file is configured; keep it
/// alive for the life of the process or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("climate_service={}", config.level.as_directive()))
    });

    let (file_writer, guard) = match &config.log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::BadPath(path.display().to_string()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let (timed, untimed) = if config.timestamps {
        (Some(tfmt::layer().with_target(false)), None)
    } else {
        (None, Some(tfmt::layer().with_target(false).without_time()))
    };
    let file_layer = file_writer.map(|writer| tfmt::layer().with_ansi(false).with_writer(writer));

    tracing_subscriber::registry()
        .with(filter)
        .with(timed)
        .with(untimed)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(level = %config.level, "logging initialized");
    Ok(guard)
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - database restarting, pool exhausted, network blip
    Expected,
    /// Unexpected failure - bad query, schema drift, undecodable row
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

pub fn classify_store_failure(err: &StoreError) -> FailureType {
    match err {
        StoreError::Unavailable(_) => FailureType::Expected,
        StoreError::Query(_) => FailureType::Unexpected,
    }
}

/// Logs a store failure for `operation` at a level matching its class.
pub fn log_store_failure(operation: &str, err: &StoreError) {
    let failure_type = classify_store_failure(err);
    match failure_type {
        FailureType::Expected => {
            tracing::warn!(operation, failure = %failure_type, error = %err, "store read failed")
        }
        FailureType::Unexpected => {
            tracing::error!(operation, failure = %failure_type, error = %err, "store read failed")
        }
    }
}
