//! Configuration schema for virtdb
//!
//! Configuration is stored at `~/.config/virtdb/config.toml`

use crate::virtuals::update::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Repository settings
    pub repository: RepositoryConfig,

    /// Virtuals cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Repository configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository root used when `--repo` is not given
    pub location: Option<PathBuf>,
}

/// Virtuals cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the mtime cache; when false every resolution scans the repository
    pub enabled: bool,

    /// Cache directory (defaults to the user cache dir)
    pub dir: Option<PathBuf>,

    /// Group owning the cache directory and file
    pub group: Option<String>,

    /// Mode for a newly created cache directory
    pub dir_mode: u32,

    /// Mode for the cache file
    pub file_mode: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            group: None,
            dir_mode: DEFAULT_DIR_MODE,
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}
