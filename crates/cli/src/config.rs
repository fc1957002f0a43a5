//! Runtime configuration from the environment.

use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA_DIR: &str = ".ledger";
const DEFAULT_LOG: &str = "info";

/// Settings for the `ledger` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Directory holding customer records
    pub data_dir: PathBuf,
    /// `tracing` filter directive
    pub log_filter: String,
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Data directory set to an empty path
    #[error("LEDGER_DATA_DIR must not be empty")]
    EmptyDataDir,

    /// Log filter that `EnvFilter` cannot parse
    #[error("LEDGER_LOG is not a valid log filter: {0}")]
    InvalidLogFilter(String),
}

impl LedgerConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("LEDGER_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let log_filter = lookup("LEDGER_LOG").unwrap_or_else(|| DEFAULT_LOG.to_string());

        Self {
            data_dir: PathBuf::new(),
            log_filter: DEFAULT_LOG.to_string(),
        }
        .with_data_dir(data_dir)?
        .with_log_filter(log_filter)
    }

    /// Override the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.into();
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        self.data_dir = data_dir;
        Ok(self)
    }

    /// Override the log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Result<Self, ConfigError> {
        let filter = filter.into();
        EnvFilter::try_new(&filter).map_err(|e| ConfigError::InvalidLogFilter(e.to_string()))?;
        self.log_filter = filter;
        Ok(self)
    }

    /// The log filter as an `EnvFilter`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG))
    }
}
