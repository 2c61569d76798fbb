//! Data source configuration.
//!
//! Loaded from YAML by default, or from JSON when the file extension is
//! `.json`.
//!
//! # Example YAML
//!
//! ```yaml
//! path: data/library.db
//! create_if_missing: true
//! foreign_keys: true
//! synchronous: normal
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqliteError};

/// SQLite `PRAGMA synchronous` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// `OFF`
    Off,
    /// `NORMAL` (the default).
    #[default]
    Normal,
    /// `FULL`
    Full,
}

impl SyncMode {
    /// Pragma statement applying this mode.
    pub const fn pragma(self) -> &'static str {
        match self {
            SyncMode::Off => "PRAGMA synchronous = OFF",
            SyncMode::Normal => "PRAGMA synchronous = NORMAL",
            SyncMode::Full => "PRAGMA synchronous = FULL",
        }
    }
}

/// Settings for a file-backed [`DataSource`](crate::DataSource).
///
/// # Examples
///
/// ```
/// # use sqlentity_sqlite::{DataSourceConfig, SyncMode};
/// let config = DataSourceConfig::new("library.db");
/// assert!(config.create_if_missing);
/// assert!(config.foreign_keys);
/// assert_eq!(config.synchronous, SyncMode::Normal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Database file.
    pub path: PathBuf,
    /// Create the file, its tables and default data when it is missing.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    /// Enforce foreign keys on every connection.
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    /// Durability level.
    #[serde(default)]
    pub synchronous: SyncMode,
}

fn default_true() -> bool {
    true
}

impl DataSourceConfig {
    /// Default settings for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            foreign_keys: true,
            synchronous: SyncMode::Normal,
        }
    }

    /// Loads configuration from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](SqliteError::IoError) if the file cannot be read,
    /// [`YamlError`](SqliteError::YamlError) or
    /// [`JsonError`](SqliteError::JsonError) if parsing fails, and
    /// [`ConfigError`](SqliteError::ConfigError) if the database path is
    /// empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let config: Self = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration, as JSON when `path` ends in `.json` and as
    /// YAML otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](SqliteError::IoError) if the file cannot be
    /// written, or the serializer's error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }

    /// Checks the settings for values no connection could use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](SqliteError::ConfigError) for an empty path.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(SqliteError::ConfigError(
                "database path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
