//! Package manifest parsing
//!
//! Each package version is a `<name>-<version>.toml` file describing the
//! virtuals it provides and the build options it has enabled.

use crate::depset::ProvidesExpr;
use crate::error::{VirtdbError, VirtdbResult};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Parsed package manifest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageManifest {
    /// Human-readable description
    pub description: String,

    /// Provides expression, e.g. `virtual/editor gtk? ( virtual/gui-editor )`
    pub provides: String,

    /// Enabled build options
    #[serde(rename = "use")]
    pub use_flags: BTreeSet<String>,
}

impl PackageManifest {
    /// Parse a manifest from a TOML file on disk
    pub fn from_file(path: &Path) -> VirtdbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VirtdbError::io(format!("reading package manifest {}", path.display()), e)
        })?;
        Self::parse(&content).map_err(|e| match e {
            VirtdbError::TomlParse(e) => VirtdbError::manifest(path, e.to_string()),
            other => other,
        })
    }

    /// Parse a manifest from a TOML string
    pub fn parse(content: &str) -> VirtdbResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse the provides declaration
    pub fn provides_expr(&self, path: &Path) -> VirtdbResult<ProvidesExpr> {
        ProvidesExpr::parse(&self.provides).map_err(|e| VirtdbError::manifest(path, e.to_string()))
    }
}
