//! Store tunables.
//!
//! Configuration is read from TOML; every field has a default so an empty
//! document is a valid configuration.

use crate::error::{ErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Default number of KV entries handled per batch by bulk operations.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 1000;

/// Default upper bound for one serialized row payload.
pub const DEFAULT_MAX_ROW_BYTES: usize = 4 * 1024 * 1024;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid store config: {0}")]
    Parse(String),

    #[error("invalid store config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::precondition(ErrorOrigin::Config, err.to_string())
    }
}

///
/// StoreConfig
///
/// Runtime tunables for one [`Store`](crate::store::Store).
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Entries handled per batch by drop-table, delete-all-rows and backfill.
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,

    /// Row payloads larger than this are rejected on write and on read.
    #[serde(default = "default_max_row_bytes")]
    pub max_row_bytes: usize,

    /// Report events to the metrics sink.
    #[serde(default = "default_metrics")]
    pub metrics: bool,
}

const fn default_scan_batch_size() -> usize {
    DEFAULT_SCAN_BATCH_SIZE
}

const fn default_max_row_bytes() -> usize {
    DEFAULT_MAX_ROW_BYTES
}

const fn default_metrics() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: default_scan_batch_size(),
            max_row_bytes: default_max_row_bytes(),
            metrics: default_metrics(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "scan_batch_size",
                reason: "must be greater than zero",
            });
        }
        if self.max_row_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_row_bytes",
                reason: "must be greater than zero",
            });
        }

        Ok(())
    }
}

///
/// TESTS
///
