//! Configuration management for newsprefs.
//!
//! Configuration is loaded with figment from defaults, an optional TOML file,
//! and environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "newsprefs";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "preferences.db";

/// Storage key of the preferences record.
pub const DEFAULT_PREFERENCES_KEY: &str = "newsPreferences";

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "newsbrief";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NEWSPREFS_`, `__` between levels,
///    e.g. `NEWSPREFS_STORAGE__NAMESPACE`)
/// 2. TOML config file at `~/.config/newsprefs/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Preferences record configuration.
    pub preferences: PreferencesConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/newsprefs/preferences.db`
    pub database_path: Option<PathBuf>,
    /// Scope for all keys, one per profile.
    pub namespace: String,
    /// How long to wait for another writer's lock, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Preferences-record configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Storage key of the record.
    pub key: String,
    /// Read-merge-write cycles attempted before a save gives up on conflicts.
    pub max_save_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_PREFERENCES_KEY.to_string(),
            max_save_attempts: 3,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(Toml::file(&config_file)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the configuration file at `path`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or holds
    /// invalid values.
    pub fn check_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigValidation {
                message: format!("no configuration file at {}", path.display()),
            });
        }
        Self::load_from(Some(path.to_path_buf()))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file)
            .merge(Env::prefixed("NEWSPREFS_").split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.namespace.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "storage.namespace must not be empty".to_string(),
            });
        }

        if self.preferences.key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "preferences.key must not be empty".to_string(),
            });
        }

        if self.preferences.max_save_attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "preferences.max_save_attempts must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }
}
