//! `config.toml` discovery and loading.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::app_config::AppConfig;

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "patchbay";
const APP_NAME: &str = "patchbay-images";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while locating or bootstrapping the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user config directory exists on this platform.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// Reading or writing the file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The default config could not be rendered as TOML.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Finds and loads `config.toml`, seeding it with defaults on first run.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Uses the platform config directory, e.g. `~/.config/patchbay-images`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigDirNotFound` if there is no home directory.
    pub fn new() -> Result<Self, ConfigError> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| Self::with_dir(dirs.config_dir().to_path_buf()))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Uses `dir` instead of the platform directory.
    #[must_use]
    pub const fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the default config file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Loads the config from `path_override` or the default path.
    ///
    /// A missing file is created with defaults. A malformed file is left
    /// alone and defaults are used. Out-of-range `[cache]` values are
    /// clamped and reported.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or the defaults
    /// cannot be written.
    pub fn load(&self, path_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let path = path_override.map_or_else(|| self.config_path(), Path::to_path_buf);

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match toml::from_str::<AppConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed config file, using defaults");
                    return Ok(AppConfig::default());
                }
            }
        } else {
            info!(path = %path.display(), "Config file not found, writing defaults");
            let config = AppConfig::default();
            write_atomic(&path, &toml::to_string_pretty(&config)?)?;
            config
        };

        for adjustment in config.cache.clamp() {
            warn!(path = %path.display(), "{adjustment}");
        }
        debug!(limits = ?config.cache.limits(), "Effective cache limits");
        config.config = Some(path);
        Ok(config)
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), ConfigError> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("config path has no parent directory"))?;
    fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
