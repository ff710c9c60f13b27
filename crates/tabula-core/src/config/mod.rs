//! Context configuration loaded from TOML.


use crate::persist::{ConflictPolicy, IsolationLevel, TransactionOptions};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("cannot read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

///
/// ContextConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    pub connection_string: String,

    /// Snapshot file read by `use_offline_cache` and written by
    /// `save_schema_cache`.
    pub schema_cache_path: Option<PathBuf>,

    pub use_offline_cache: bool,

    pub transaction: TransactionConfig,

    pub persistence: PersistenceConfig,
}

impl ContextConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&text)
    }

    /// Offline caches need a file to load; online contexts need somewhere
    /// to connect.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_offline_cache && self.schema_cache_path.is_none() {
            return Err(ConfigError::Invalid(
                "use_offline_cache requires schema_cache_path".to_string(),
            ));
        }
        if !self.use_offline_cache && self.connection_string.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "connection_string is required unless use_offline_cache is set".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            isolation: self.transaction.isolation,
            timeout: self.transaction.timeout_secs.map(Duration::from_secs),
        }
    }
}

///
/// TransactionConfig
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionConfig {
    pub isolation: IsolationLevel,
    pub timeout_secs: Option<u64>,
}

///
/// PersistenceConfig
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Conflict policy given to entities created through the context.
    pub default_conflict: ConflictPolicy,
}
