//! Configuration management for virtdb

pub mod schema;

pub use schema::Config;

use crate::error::{VirtdbError, VirtdbResult};
use crate::fsutil;
use crate::virtuals::CacheOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("virtdb")
            .join("config.toml")
    }

    /// Get the default cache directory
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("virtdb")
    }

    /// Load configuration, using defaults if the file does not exist
    pub fn load(&self) -> VirtdbResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, path: &Path) -> VirtdbResult<Config> {
        let content = fs::read_to_string(path)
            .map_err(|e| VirtdbError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| VirtdbError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> VirtdbResult<()> {
        self.ensure_config_dir()?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).map_err(|e| {
            VirtdbError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    fn ensure_config_dir(&self) -> VirtdbResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| VirtdbError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Repository root: `explicit` if given, else the configured location
    pub fn repository_location(&self, explicit: Option<&Path>) -> VirtdbResult<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.repository.location.clone())
            .ok_or(VirtdbError::RepoNotConfigured)
    }

    /// Cache settings with `dir` overriding the configured directory
    ///
    /// A `[cache] group` that cannot be resolved is logged and ignored; the
    /// cache is then written with the process's default group.
    pub fn cache_options(&self, dir: Option<&Path>) -> CacheOptions {
        let dir = dir
            .map(Path::to_path_buf)
            .or_else(|| self.cache.dir.clone())
            .unwrap_or_else(ConfigManager::default_cache_dir);

        let gid = self
            .cache
            .group
            .as_deref()
            .and_then(|group| match fsutil::lookup_group(group) {
                Ok(gid) => Some(gid),
                Err(e) => {
                    warn!("Ignoring cache group: {}", e);
                    None
                }
            });

        CacheOptions {
            dir,
            dir_mode: self.cache.dir_mode,
            file_mode: self.cache.file_mode,
            gid,
        }
    }
}
