//! Repository and package abstractions consumed by virtual resolution
//!
//! The resolver only needs to iterate packages (optionally restricted to one
//! category), read each package's provides declaration and identity, and
//! find the repository root on disk. [`TreeRepository`] is the on-disk
//! implementation used by the CLI.

pub mod manifest;
pub mod tree;

pub use manifest::PackageManifest;
pub use tree::{TreePackage, TreeRepository};

use crate::atom::Atom;
use crate::error::VirtdbResult;
use crate::virtuals::mtime;
use std::collections::BTreeMap;
use std::path::Path;

/// A concrete package as seen by virtual resolution
pub trait Package {
    /// Category the package lives in
    fn category(&self) -> &str;

    /// Full version including revision
    fn full_version(&self) -> &str;

    /// Atom pinning exactly this package version
    fn versioned_atom(&self) -> &Atom;

    /// Virtuals provided under the package's enabled build options
    fn provided_virtuals(&self) -> Vec<Atom>;
}

/// A source of packages rooted at a directory
pub trait Repository {
    type Package: Package;

    /// Repository root
    fn location(&self) -> &Path;

    /// Every package in the repository
    fn packages(&self) -> VirtdbResult<Vec<Self::Package>>;

    /// Packages whose category equals `category`
    ///
    /// A category that does not exist yields no packages.
    fn category_packages(&self, category: &str) -> VirtdbResult<Vec<Self::Package>>;

    /// Category subdirectories under the root and their mtimes
    fn category_mtimes(&self) -> VirtdbResult<BTreeMap<String, i64>> {
        mtime::category_mtimes(self.location())
    }
}

impl<R: Repository + ?Sized> Repository for &R {
    type Package = R::Package;

    fn location(&self) -> &Path {
        (**self).location()
    }

    fn packages(&self) -> VirtdbResult<Vec<Self::Package>> {
        (**self).packages()
    }

    fn category_packages(&self, category: &str) -> VirtdbResult<Vec<Self::Package>> {
        (**self).category_packages(category)
    }

    fn category_mtimes(&self) -> VirtdbResult<BTreeMap<String, i64>> {
        (**self).category_mtimes()
    }
}
