//! On-disk package tree
//!
//! Layout: `<root>/<category>/<package>/<package>-<version>.toml`.
//! Dot-directories (`.git`, metadata) are skipped at every level.

use super::{Package, PackageManifest, Repository};
use crate::atom::Atom;
use crate::depset::ProvidesExpr;
use crate::error::{VirtdbError, VirtdbResult};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest file extension
const MANIFEST_EXT: &str = "toml";

/// One package version loaded from the tree
#[derive(Debug, Clone)]
pub struct TreePackage {
    atom: Atom,
    provides: ProvidesExpr,
    use_flags: BTreeSet<String>,
    path: PathBuf,
}

impl TreePackage {
    /// Manifest file backing this package
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Package for TreePackage {
    fn category(&self) -> &str {
        self.atom.category()
    }

    fn full_version(&self) -> &str {
        // Tree packages are always built from versioned atoms
        self.atom.version().unwrap_or_default()
    }

    fn versioned_atom(&self) -> &Atom {
        &self.atom
    }

    fn provided_virtuals(&self) -> Vec<Atom> {
        self.provides.evaluate(&self.use_flags)
    }
}

/// Package repository backed by a directory tree
#[derive(Debug, Clone)]
pub struct TreeRepository {
    root: PathBuf,
}

impl TreeRepository {
    /// Open a repository rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> VirtdbResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VirtdbError::RepoNotFound(root));
        }
        Ok(Self { root })
    }

    fn load_category(&self, category: &str) -> VirtdbResult<Vec<TreePackage>> {
        let cat_dir = self.root.join(category);
        let Some(package_dirs) = sorted_subdirs(&cat_dir)? else {
            debug!("Category {} vanished, no packages", category);
            return Ok(Vec::new());
        };

        let mut packages = Vec::new();
        for name in package_dirs {
            self.load_package_versions(category, &name, &mut packages)?;
        }
        Ok(packages)
    }

    fn load_package_versions(
        &self,
        category: &str,
        name: &str,
        out: &mut Vec<TreePackage>,
    ) -> VirtdbResult<()> {
        let pkg_dir = self.root.join(category).join(name);
        let entries = match fs::read_dir(&pkg_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(VirtdbError::io(
                    format!("reading package directory {}", pkg_dir.display()),
                    e,
                ))
            }
        };

        let prefix = format!("{}-", name);
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VirtdbError::io("reading package entry", e))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != MANIFEST_EXT) {
                continue;
            }
            let Some(version) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix(&prefix))
            else {
                continue;
            };
            files.push((version.to_string(), path));
        }
        files.sort();

        for (version, path) in files {
            let atom = Atom::versioned(category, name, &version)
                .map_err(|e| VirtdbError::manifest(&path, e.to_string()))?;
            if atom.package() != name {
                return Err(VirtdbError::manifest(
                    &path,
                    format!("file name does not match package '{}'", name),
                ));
            }
            let manifest = PackageManifest::from_file(&path)?;
            let provides = manifest.provides_expr(&path)?;
            out.push(TreePackage {
                atom,
                provides,
                use_flags: manifest.use_flags,
                path,
            });
        }
        Ok(())
    }
}

impl Repository for TreeRepository {
    type Package = TreePackage;

    fn location(&self) -> &Path {
        &self.root
    }

    fn packages(&self) -> VirtdbResult<Vec<TreePackage>> {
        let categories = sorted_subdirs(&self.root)?
            .ok_or_else(|| VirtdbError::RepoNotFound(self.root.clone()))?;

        let mut packages = Vec::new();
        for category in categories {
            packages.extend(self.load_category(&category)?);
        }
        debug!("Loaded {} packages from {}", packages.len(), self.root.display());
        Ok(packages)
    }

    fn category_packages(&self, category: &str) -> VirtdbResult<Vec<TreePackage>> {
        self.load_category(category)
    }
}

/// Visible subdirectory names of `dir`, sorted; `None` if `dir` is gone
fn sorted_subdirs(dir: &Path) -> VirtdbResult<Option<Vec<String>>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(VirtdbError::io(
                format!("reading directory {}", dir.display()),
                e,
            ))
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| VirtdbError::io("reading directory entry", e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(Some(names))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Write `<root>/<cat>/<name>/<name>-<version>.toml`
    pub(crate) fn write_package(root: &Path, cpv: &str, provides: &str, use_flags: &[&str]) {
        let atom = Atom::parse(&format!("={}", cpv)).unwrap();
        let dir = root.join(atom.category()).join(atom.package());
        fs::create_dir_all(&dir).unwrap();
        let flags: Vec<String> = use_flags.iter().map(|f| format!("\"{}\"", f)).collect();
        fs::write(
            dir.join(format!("{}-{}.toml", atom.package(), atom.version().unwrap())),
            format!("provides = \"{}\"\nuse = [{}]\n", provides, flags.join(", ")),
        )
        .unwrap();
    }

    #[test]
    fn open_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = TreeRepository::open(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, VirtdbError::RepoNotFound(_)));
    }

    #[test]
    fn loads_all_packages_sorted() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), "util/b-1.0", "virtual/editor", &[]);
        write_package(temp.path(), "util/a-1.0", "virtual/editor", &[]);
        write_package(temp.path(), "app/c-2.0-r1", "", &[]);
        fs::create_dir_all(temp.path().join(".git/objects")).unwrap();

        let repo = TreeRepository::open(temp.path()).unwrap();
        let atoms: Vec<String> = repo
            .packages()
            .unwrap()
            .iter()
            .map(|p| p.versioned_atom().to_string())
            .collect();

        assert_eq!(atoms, vec!["=app/c-2.0-r1", "=util/a-1.0", "=util/b-1.0"]);
    }

    #[test]
    fn category_restriction() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), "util/a-1.0", "virtual/editor", &[]);
        write_package(temp.path(), "app/c-2.0", "virtual/editor", &[]);

        let repo = TreeRepository::open(temp.path()).unwrap();
        let pkgs = repo.category_packages("app").unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].category(), "app");
        assert_eq!(pkgs[0].full_version(), "2.0");

        assert!(repo.category_packages("gone").unwrap().is_empty());
    }

    #[test]
    fn provides_follow_use_flags() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            "app/vim-9.0",
            "virtual/editor gtk? ( virtual/gui-editor )",
            &["gtk"],
        );
        write_package(
            temp.path(),
            "app/nano-7.2",
            "virtual/editor gtk? ( virtual/gui-editor )",
            &[],
        );

        let repo = TreeRepository::open(temp.path()).unwrap();
        let pkgs = repo.packages().unwrap();
        let nano = pkgs
            .iter()
            .find(|p| p.versioned_atom().package() == "nano")
            .unwrap();
        let vim = pkgs
            .iter()
            .find(|p| p.versioned_atom().package() == "vim")
            .unwrap();

        assert_eq!(nano.provided_virtuals().len(), 1);
        assert_eq!(vim.provided_virtuals().len(), 2);
    }

    #[test]
    fn invalid_version_in_file_name() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("app").join("x");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("x-notaversion.toml"), "").unwrap();

        let repo = TreeRepository::open(temp.path()).unwrap();
        let err = repo.packages().unwrap_err();
        assert!(matches!(err, VirtdbError::ManifestInvalid { .. }));
    }
}
