//! Manager configuration: directories, timeouts, and the extraction tool.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. Built-in defaults ([`ManagerConfig::from_env`])
//! 2. An optional TOML file ([`FileConfig`]), by default at
//!    `$XDG_CONFIG_HOME/mediafetch/config.toml`
//! 3. Explicit overrides from the caller (the CLI flags)
//!
//! ```toml
//! download_dir = "/srv/media"
//! connect_timeout_secs = 10
//! extractor_program = "/usr/local/bin/yt-dlp"
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_EXTRACTOR_PROGRAM, READ_TIMEOUT_SECS, TITLE_PROBE_TIMEOUT_SECS,
};

const APP_DIR: &str = "mediafetch";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "jobs.db";
const DOWNLOADS_DIR: &str = "downloads";
const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=3600;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `$XDG_DATA_HOME` nor `$HOME` is set.
    #[error("cannot determine data directory: neither XDG_DATA_HOME nor HOME is set")]
    NoDataDirectory,

    /// Config file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid config value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Runtime configuration handed to [`crate::Dispatcher::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Directory every job writes into.
    pub download_dir: PathBuf,
    /// `SQLite` database file holding job records.
    pub database_path: PathBuf,
    /// HTTP connect timeout for streaming fetches.
    pub connect_timeout: Duration,
    /// HTTP read timeout for streaming fetches.
    pub read_timeout: Duration,
    /// Upper bound on the title probe for extraction jobs.
    pub title_probe_timeout: Duration,
    /// Extraction tool program name or path.
    pub extractor_program: String,
}

impl ManagerConfig {
    /// Creates a config with explicit directories and default timeouts.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>, database_path: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            database_path: database_path.into(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            title_probe_timeout: Duration::from_secs(TITLE_PROBE_TIMEOUT_SECS),
            extractor_program: DEFAULT_EXTRACTOR_PROGRAM.to_string(),
        }
    }

    /// Creates the default config under the user's data directory:
    /// `$XDG_DATA_HOME/mediafetch` or `$HOME/.local/share/mediafetch`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDataDirectory`] if neither variable is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let data_dir = default_data_dir(&lookup).ok_or(ConfigError::NoDataDirectory)?;
        Ok(Self::new(
            data_dir.join(DOWNLOADS_DIR),
            data_dir.join(DATABASE_FILE),
        ))
    }

    /// Overlays the values present in a config file.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(dir) = &file.download_dir {
            self.download_dir.clone_from(dir);
        }
        if let Some(path) = &file.database_path {
            self.database_path.clone_from(path);
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.read_timeout_secs {
            self.read_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.title_probe_timeout_secs {
            self.title_probe_timeout = Duration::from_secs(secs);
        }
        if let Some(program) = &file.extractor_program {
            self.extractor_program.clone_from(program);
        }
    }
}

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub download_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub title_probe_timeout_secs: Option<u64>,
    pub extractor_program: Option<String>,
}

impl FileConfig {
    /// Parses and validates TOML text. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at `path`; a missing file yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file exists but cannot be read,
    /// or any error from [`FileConfig::parse`].
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&raw, path).map(Some)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        validate_timeout_secs("title_probe_timeout_secs", self.title_probe_timeout_secs)?;
        if let Some(program) = &self.extractor_program
            && program.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "extractor_program",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !TIMEOUT_RANGE_SECS.contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            message: format!("{value}. Expected range: 1..=3600"),
        });
    }
    Ok(())
}

/// Resolves the default config file path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediafetch/config.toml`
/// 2. `$HOME/.config/mediafetch/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    config_path_from_lookup(|name| std::env::var_os(name))
}

fn config_path_from_lookup<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(xdg) = non_empty(lookup("XDG_CONFIG_HOME")) {
        return Some(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
    }
    let home = non_empty(lookup("HOME"))?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn default_data_dir<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(xdg) = non_empty(lookup("XDG_DATA_HOME")) {
        return Some(PathBuf::from(xdg).join(APP_DIR));
    }
    let home = non_empty(lookup("HOME"))?;
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR),
    )
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|v| !v.is_empty())
}
