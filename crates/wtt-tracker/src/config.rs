//! Tracker configuration loaded from TOML.
//!
//! Lookup order: an explicit path, then `$WTT_CONFIG`, then
//! `<config dir>/wtt/config.toml`. A file that does not exist yields the
//! defaults; a file that exists but cannot be parsed, or holds out-of-range
//! values, is an error.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use wtt_core::config::{
    DEFAULT_BREAK_THRESHOLD_SECS, DEFAULT_STARTUP_GRACE_SECS, DEFAULT_UNSAVED_WARNING_SECS,
};
use wtt_core::{DomainError, Thresholds};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "WTT_CONFIG";

/// Default tick period in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Default number of ticks between autosaves.
pub const DEFAULT_AUTOSAVE_TICKS: u64 = 60;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Settings for one tracker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub break_threshold_secs: u64,
    pub unsaved_warning_threshold_secs: u64,
    pub tick_interval_ms: u64,
    pub autosave_ticks: u64,
    pub startup_grace_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            break_threshold_secs: DEFAULT_BREAK_THRESHOLD_SECS,
            unsaved_warning_threshold_secs: DEFAULT_UNSAVED_WARNING_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            autosave_ticks: DEFAULT_AUTOSAVE_TICKS,
            startup_grace_secs: DEFAULT_STARTUP_GRACE_SECS,
        }
    }
}

impl TrackerConfig {
    /// The read-only subset handed to the core.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            break_threshold_secs: self.break_threshold_secs,
            unsaved_warning_threshold_secs: self.unsaved_warning_threshold_secs,
            startup_grace_secs: self.startup_grace_secs,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds().validate()?;
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", self.tick_interval_ms, "at least 1"));
        }
        if self.autosave_ticks == 0 {
            return Err(invalid("autosave_ticks", self.autosave_ticks, "at least 1"));
        }
        Ok(())
    }

    /// Parses and validates a TOML document. `origin` is used in errors.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "Loading config");
                Self::from_toml_str(&content, path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// `<config dir>/wtt/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wtt").join("config.toml"))
    }

    /// Picks the config file: `explicit`, then the environment, then the default.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .or_else(Self::default_path)
    }

    /// Resolves and loads the config, using defaults when no file applies.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::resolve_path(explicit) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }
}

fn invalid(field: &str, value: u64, expected: &str) -> ConfigError {
    ConfigError::Invalid(DomainError::InvalidFieldValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    })
}
