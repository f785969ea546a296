//! Error types for virtdb
//!
//! All modules use `VirtdbResult<T>` as their return type.

use crate::atom::AtomError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for virtdb operations
pub type VirtdbResult<T> = Result<T, VirtdbError>;

/// All errors that can occur in virtdb
#[derive(Error, Debug)]
pub enum VirtdbError {
    // Repository errors
    #[error("Repository not found: {0}")]
    RepoNotFound(PathBuf),

    #[error("No repository configured")]
    RepoNotConfigured,

    #[error("Invalid package manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error(transparent)]
    Atom(#[from] AtomError),

    // Cache errors
    #[error("Failed to read virtuals cache {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown group for cache ownership: {0}")]
    GroupNotFound(String),

    // Resolution errors
    #[error("No providers for virtual: {0}")]
    VirtualNotFound(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file already exists: {0}")]
    ConfigExists(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl VirtdbError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a manifest error for the given path
    pub fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RepoNotConfigured => {
                Some("Pass --repo or set [repository] location in the config file")
            }
            Self::CacheRead { .. } => Some("Run: virtdb cache clear"),
            Self::ConfigExists(_) => Some("Use --force to overwrite"),
            Self::GroupNotFound(_) => Some("Unset [cache] group or create the group"),
            _ => None,
        }
    }
}
