//! Package atoms and the "any of" combinator
//!
//! An atom names a package (`category/name`) or one exact version of it
//! (`=category/name-1.0-r1`). Parsing fails with [`AtomError`] rather than
//! a generic error so callers can tell corrupt atom text apart from I/O
//! problems.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Full version: `1.2.3b_rc2_p1-r4`
const VERSION_PATTERN: &str = r"^[0-9]+(\.[0-9]+)*[a-z]?(_(alpha|beta|pre|rc|p)[0-9]*)*(-r[0-9]+)?$";

/// Atom parse failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtomError {
    #[error("atom is empty")]
    Empty,

    #[error("atom '{0}' is malformed: missing category")]
    MissingCategory(String),

    #[error("atom '{atom}' is malformed: invalid name '{name}'")]
    InvalidName { atom: String, name: String },

    #[error("atom '{0}' is malformed: '=' requires a version")]
    MissingVersion(String),

    #[error("atom '{0}' is malformed: a version requires the '=' operator")]
    UnexpectedVersion(String),
}

/// A reference to a package, optionally pinned to one exact version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    category: String,
    package: String,
    version: Option<String>,
}

impl Atom {
    /// Parse an atom from its text form
    pub fn parse(text: &str) -> Result<Self, AtomError> {
        if text.is_empty() {
            return Err(AtomError::Empty);
        }

        let (exact, rest) = match text.strip_prefix('=') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let (category, pkgver) = rest
            .split_once('/')
            .ok_or_else(|| AtomError::MissingCategory(text.to_string()))?;
        check_name(text, category)?;

        match (exact, split_version(pkgver)) {
            (true, Some((package, version))) => Ok(Self {
                category: category.to_string(),
                package: package.to_string(),
                version: Some(version.to_string()),
            }),
            (true, None) => Err(AtomError::MissingVersion(text.to_string())),
            (false, Some(_)) => Err(AtomError::UnexpectedVersion(text.to_string())),
            (false, None) => {
                check_name(text, pkgver)?;
                Ok(Self {
                    category: category.to_string(),
                    package: pkgver.to_string(),
                    version: None,
                })
            }
        }
    }

    /// Build an exact-version atom from its parts
    pub fn versioned(category: &str, package: &str, version: &str) -> Result<Self, AtomError> {
        Self::parse(&format!("={}/{}-{}", category, package, version))
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Full version including revision, if the atom is pinned
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// `category/package` without any version
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "={}/{}-{}", self.category, self.package, version),
            None => write!(f, "{}/{}", self.category, self.package),
        }
    }
}

impl FromStr for Atom {
    type Err = AtomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Immutable "any of these" combination over atoms
///
/// Order is preserved and duplicates are kept; matching is unaffected by
/// either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnyOf(Box<[Atom]>);

impl AnyOf {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self(atoms.into_boxed_slice())
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any member equals `atom`
    pub fn matches(&self, atom: &Atom) -> bool {
        self.0.iter().any(|a| a == atom)
    }
}

impl fmt::Display for AnyOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|| (")?;
        for atom in self.0.iter() {
            write!(f, " {}", atom)?;
        }
        write!(f, " )")
    }
}

fn check_name(atom: &str, name: &str) -> Result<(), AtomError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(AtomError::InvalidName {
            atom: atom.to_string(),
            name: name.to_string(),
        })
    }
}

/// Split `name-1.0-r1` into (`name`, `1.0-r1`) at the first hyphen that
/// starts a valid version.
fn split_version(pkgver: &str) -> Option<(&str, &str)> {
    pkgver
        .match_indices('-')
        .map(|(i, _)| (&pkgver[..i], &pkgver[i + 1..]))
        .find(|(name, version)| {
            !name.is_empty() && check_name(pkgver, name).is_ok() && is_valid_version(version)
        })
}

fn is_valid_version(version: &str) -> bool {
    static VERSION_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    VERSION_RE
        .get_or_init(|| Regex::new(VERSION_PATTERN))
        .as_ref()
        .is_ok_and(|re| re.is_match(version))
}
