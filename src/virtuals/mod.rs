//! Virtual package resolution
//!
//! Maps each virtual name to the concrete packages providing it, grouped by
//! the provider's own full version. Results can be computed from scratch or
//! incrementally from a per-category mtime cache.
//!
//! # Flow
//!
//! | Path | Steps |
//! |------|-------|
//! | Cold | repository → [`collect`] → [`RawVirtuals`] → [`finalize`] |
//! | Warm | cache file + category mtimes → rescan stale categories → [`finalize`] |
//!
//! Only [`ResolvedVirtuals`] leaves this module; the raw builder is owned by
//! whichever path produced it.

pub mod codec;
pub mod collect;
pub mod mtime;
pub mod resolver;
pub mod update;

pub use codec::{CacheSnapshot, CategoryEntry, DecodeOutcome, CACHE_FILE_NAME};
pub use collect::{collect, finalize, provider_records};
pub use resolver::VirtualResolver;
pub use update::{
    resolve_cached, resolve_cached_with_stats, resolve_nocache, CacheOptions, ResolveStats,
};

use crate::atom::{AnyOf, Atom};
use serde::Serialize;
use std::collections::BTreeMap;

/// Name of an abstract capability (`editor` for `virtual/editor`)
pub type VirtualName = String;

/// A provider's full version, used as the grouping key under a virtual
pub type VersionBucket = String;

/// Version buckets of raw provider atoms
pub type RawBuckets = BTreeMap<VersionBucket, Vec<Atom>>;
/// Version buckets of finalized providers
pub type ResolvedBuckets = BTreeMap<VersionBucket, Provider>;

/// One provider declaration: `atom` at `version` provides `virtual_name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    pub virtual_name: VirtualName,
    pub version: VersionBucket,
    pub atom: Atom,
}

/// Append-only accumulation of provider records
///
/// Duplicates are kept. Consumed by [`finalize`], after which no further
/// records can be added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVirtuals {
    map: BTreeMap<VirtualName, RawBuckets>,
}

impl RawVirtuals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one provider atom under `virtual_name` / `version`
    pub fn push(&mut self, virtual_name: &str, version: &str, atom: Atom) {
        self.map
            .entry(virtual_name.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default()
            .push(atom);
    }

    /// Fold provider records in
    pub fn extend<I: IntoIterator<Item = ProviderRecord>>(&mut self, records: I) {
        for record in records {
            self.push(&record.virtual_name, &record.version, record.atom);
        }
    }

    /// Providers recorded for one virtual
    pub fn get(&self, virtual_name: &str) -> Option<&RawBuckets> {
        self.map.get(virtual_name)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Every record, in virtual then version order
    pub fn records(&self) -> impl Iterator<Item = ProviderRecord> + '_ {
        self.map.iter().flat_map(|(name, buckets)| {
            buckets.iter().flat_map(move |(version, atoms)| {
                atoms.iter().map(move |atom| ProviderRecord {
                    virtual_name: name.clone(),
                    version: version.clone(),
                    atom: atom.clone(),
                })
            })
        })
    }

    pub(crate) fn into_inner(self) -> BTreeMap<VirtualName, RawBuckets> {
        self.map
    }
}

/// Finalized providers for one version bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Provider {
    /// The bucket had exactly one provider
    Single(Atom),
    /// The bucket had several; any of them satisfies the virtual
    AnyOf(AnyOf),
}

impl Provider {
    /// Member atoms in order
    pub fn atoms(&self) -> &[Atom] {
        match self {
            Self::Single(atom) => std::slice::from_ref(atom),
            Self::AnyOf(any) => any.atoms(),
        }
    }

    /// True if `atom` satisfies this provider
    pub fn matches(&self, atom: &Atom) -> bool {
        match self {
            Self::Single(single) => single == atom,
            Self::AnyOf(any) => any.matches(atom),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(atom) => write!(f, "{}", atom),
            Self::AnyOf(any) => write!(f, "{}", any),
        }
    }
}

/// Immutable virtual → version → provider map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedVirtuals {
    map: BTreeMap<VirtualName, ResolvedBuckets>,
}

impl ResolvedVirtuals {
    pub(crate) fn from_map(map: BTreeMap<VirtualName, ResolvedBuckets>) -> Self {
        Self { map }
    }

    /// Version buckets for one virtual
    pub fn get(&self, virtual_name: &str) -> Option<&ResolvedBuckets> {
        self.map.get(virtual_name)
    }

    /// Provider for one virtual at one version
    pub fn provider(&self, virtual_name: &str, version: &str) -> Option<&Provider> {
        self.map.get(virtual_name)?.get(version)
    }

    pub fn contains(&self, virtual_name: &str) -> bool {
        self.map.contains_key(virtual_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VirtualName, &ResolvedBuckets)> {
        self.map.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}
