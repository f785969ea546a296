//! Virtuals cache file format
//!
//! One line per category, tab separated:
//!
//! ```text
//! <category> <mtime> <virtual1> <version1> <atom1> <virtual2> <version2> <atom2> ...
//! . <master_mtime>
//! ```
//!
//! The `.` line records the repository root's mtime at write time. Lines are
//! kept verbatim on read and only validated when decoded, so a bad line costs
//! a rescan of its category and nothing else. Fields may contain spaces but
//! never tabs.

use super::ProviderRecord;
use crate::atom::{Atom, AtomError};
use crate::error::{VirtdbError, VirtdbResult};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

/// File name of the cache inside the cache directory
pub const CACHE_FILE_NAME: &str = "virtuals.cache";

/// Key of the master mtime line
const SENTINEL: &str = ".";

const FIELD_SEPARATOR: char = '\t';

/// Fields per provider record: virtual, version, atom
const RECORD_FIELDS: usize = 3;

/// Result of decoding one category line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Line is well formed; these are its records
    Ok(Vec<ProviderRecord>),
    /// Field count is not `1 + 3k` or the mtime is not an integer
    Malformed,
    /// An atom field failed to parse
    ParseError(AtomError),
}

/// One category's cached line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    /// Every field after the category name, verbatim
    fields: Vec<String>,
}

impl CategoryEntry {
    /// Build an entry from freshly collected records
    pub fn from_records<'a, I>(mtime: i64, records: I) -> Self
    where
        I: IntoIterator<Item = &'a ProviderRecord>,
    {
        let mut fields = vec![mtime.to_string()];
        for record in records {
            fields.push(record.virtual_name.clone());
            fields.push(record.version.clone());
            fields.push(record.atom.to_string());
        }
        Self { fields }
    }

    /// Stored mtime, if the field is present and numeric
    pub fn mtime(&self) -> Option<i64> {
        self.fields.first()?.parse().ok()
    }

    /// Validate and decode the stored records
    pub fn decode(&self) -> DecodeOutcome {
        let Some((_, triples)) = self.fields.split_first() else {
            return DecodeOutcome::Malformed;
        };
        if triples.len() % RECORD_FIELDS != 0 || self.mtime().is_none() {
            return DecodeOutcome::Malformed;
        }

        let mut records = Vec::with_capacity(triples.len() / RECORD_FIELDS);
        for triple in triples.chunks_exact(RECORD_FIELDS) {
            let atom = match Atom::parse(&triple[2]) {
                Ok(atom) => atom,
                Err(e) => return DecodeOutcome::ParseError(e),
            };
            records.push(ProviderRecord {
                virtual_name: triple[0].clone(),
                version: triple[1].clone(),
                atom,
            });
        }
        DecodeOutcome::Ok(records)
    }

    /// Number of provider records the line claims to hold
    pub fn record_count(&self) -> usize {
        self.fields.len().saturating_sub(1) / RECORD_FIELDS
    }
}

/// Parsed cache file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    entries: BTreeMap<String, CategoryEntry>,
    master_mtime: Option<i64>,
}

impl CacheSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cache file at `path`
    ///
    /// A missing file is an empty snapshot. Any other I/O failure is an
    /// error. Bytes that are not UTF-8 are replaced, which makes the affected
    /// lines fail to decode rather than failing the read.
    pub fn read(path: &Path) -> VirtdbResult<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Self::parse(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(VirtdbError::CacheRead {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Parse cache file contents
    pub fn parse(text: &str) -> Self {
        let mut snapshot = Self::default();

        for line in text.lines().filter(|line| !line.is_empty()) {
            let mut fields = line.split(FIELD_SEPARATOR);
            let Some(key) = fields.next() else {
                continue;
            };

            if key == SENTINEL {
                snapshot.master_mtime = fields.next().and_then(|f| f.parse().ok());
                continue;
            }

            snapshot.entries.insert(
                key.to_string(),
                CategoryEntry {
                    fields: fields.map(str::to_string).collect(),
                },
            );
        }

        snapshot
    }

    /// Serialize to the on-disk text form
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (category, entry) in &self.entries {
            out.push_str(category);
            for field in &entry.fields {
                out.push(FIELD_SEPARATOR);
                out.push_str(field);
            }
            out.push('\n');
        }
        if let Some(master) = self.master_mtime {
            out.push_str(&format!("{}{}{}\n", SENTINEL, FIELD_SEPARATOR, master));
        }
        out
    }

    /// Repository root mtime recorded at last write
    pub fn master_mtime(&self) -> Option<i64> {
        self.master_mtime
    }

    pub fn set_master_mtime(&mut self, mtime: i64) {
        self.master_mtime = Some(mtime);
    }

    pub fn get(&self, category: &str) -> Option<&CategoryEntry> {
        self.entries.get(category)
    }

    pub fn insert(&mut self, category: impl Into<String>, entry: CategoryEntry) {
        self.entries.insert(category.into(), entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &CategoryEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
