//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Explicit overrides from the embedding application (not handled here)
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$REPOVIEW_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/repoview/config.toml`
//! 3. `~/.repoview/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use repoview::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("workers: {}", config.worker_threads());
//! println!("credentials at {}", config.credentials_path().unwrap().display());
//! ```

pub mod schema;

pub use schema::{FileConfig, RemoteDefaults};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of worker threads for the owned network runtime.
pub const DEFAULT_WORKER_THREADS: usize = 1;

/// Default log filter when neither `REPOVIEW_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "repoview=info";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (all fields optional)
    pub file: FileConfig,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REPOVIEW_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("repoview/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".repoview/config.toml"))
            .filter(|path| path.exists())
    }

    /// Canonical config path: `~/.repoview/config.toml`.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".repoview/config.toml"))
    }

    /// Write a config file atomically (temp file, then rename).
    pub fn write_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Path of the credential file.
    ///
    /// Defaults to `~/.repoview/credentials.json`.
    pub fn credentials_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.file.credentials_path {
            return Ok(path.clone());
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".repoview/credentials.json"))
    }

    /// Worker threads for the owned network runtime. Defaults to 1.
    pub fn worker_threads(&self) -> usize {
        self.file.worker_threads.unwrap_or(DEFAULT_WORKER_THREADS)
    }

    /// Log filter directive used when `REPOVIEW_LOG` is unset.
    pub fn log_filter(&self) -> &str {
        self.file
            .log_filter
            .as_deref()
            .unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Remote name used when the caller does not name one. Defaults to "origin".
    pub fn default_remote(&self) -> &str {
        self.file
            .remote
            .as_ref()
            .and_then(|r| r.default_name.as_deref())
            .unwrap_or("origin")
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
