//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$REPOVIEW_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repoview/config.toml`
//! 3. `~/.repoview/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Values are validated after parsing (non-zero worker count, non-empty
//! remote name, parseable log filter).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration.
///
/// # Example
///
/// ```toml
/// credentials_path = "/home/me/.repoview/credentials.json"
/// worker_threads = 2
/// log_filter = "repoview=debug"
///
/// [remote]
/// default_name = "origin"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Where the credential collection is persisted
    pub credentials_path: Option<PathBuf>,

    /// Worker threads for the owned network runtime
    pub worker_threads: Option<usize>,

    /// Default `tracing` filter directive when `REPOVIEW_LOG` is unset
    pub log_filter: Option<String>,

    /// Remote defaults
    pub remote: Option<RemoteDefaults>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == Some(0) {
            return Err(ConfigError::InvalidValue(
                "worker_threads must be at least 1".to_string(),
            ));
        }

        if let Some(filter) = &self.log_filter {
            tracing_subscriber::EnvFilter::try_new(filter).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid log_filter '{}': {}", filter, e))
            })?;
        }

        if let Some(remote) = &self.remote {
            remote.validate()?;
        }

        Ok(())
    }
}

/// Remote operation defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteDefaults {
    /// Remote used when the caller does not name one
    pub default_name: Option<String>,
}

impl RemoteDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.default_name {
            if name.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote.default_name cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
