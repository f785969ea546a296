//! Cold and incremental virtuals resolution
//!
//! The incremental path trusts the cache file as a whole when the repository
//! root's mtime is unchanged, and otherwise validates it one category at a
//! time, rescanning only the categories whose directory mtime moved or whose
//! cached line is unusable.
//!
//! # Cache decisions
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Root mtime matches, every line decodes | Whole cache used, nothing scanned |
//! | Root mtime matches, any line fails | Whole decode discarded, per-category pass |
//! | Category mtime matches, line decodes | Category served from cache |
//! | Anything else | Category rescanned, cache rewritten |
//!
//! Persisting is best effort: a cache that cannot be written is logged and
//! the freshly computed result is still returned.

use super::codec::{CacheSnapshot, CategoryEntry, DecodeOutcome, CACHE_FILE_NAME};
use super::collect::{collect, finalize, provider_records};
use super::{mtime, ProviderRecord, RawVirtuals, ResolvedVirtuals};
use crate::error::VirtdbResult;
use crate::fsutil;
use crate::repo::Repository;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default mode for a newly created cache directory
pub const DEFAULT_DIR_MODE: u32 = 0o775;

/// Default mode for the cache file
pub const DEFAULT_FILE_MODE: u32 = 0o664;

/// Where and how the virtuals cache is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Directory holding the cache file
    pub dir: PathBuf,

    /// Mode for the directory if it has to be created
    pub dir_mode: u32,

    /// Mode for the cache file
    pub file_mode: u32,

    /// Group owning the directory and file
    pub gid: Option<u32>,
}

impl CacheOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dir_mode: DEFAULT_DIR_MODE,
            file_mode: DEFAULT_FILE_MODE,
            gid: None,
        }
    }

    /// Path of the cache file
    pub fn cache_file(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }
}

/// What an incremental resolution did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// The whole cache was used without checking categories
    pub fast_path: bool,

    /// Categories served from the cache
    pub cache_hits: Vec<String>,

    /// Categories scanned from the repository
    pub rescanned: Vec<String>,

    /// Cached categories no longer present in the repository
    pub dropped: Vec<String>,

    /// The cache file was rewritten
    pub cache_written: bool,
}

impl ResolveStats {
    /// True if the cache had to be brought up to date
    pub fn needs_rewrite(&self) -> bool {
        !self.rescanned.is_empty() || !self.dropped.is_empty()
    }
}

/// Resolve virtuals by scanning every package in `repo`
pub fn resolve_nocache<R: Repository>(repo: &R) -> VirtdbResult<ResolvedVirtuals> {
    let packages = repo.packages()?;
    let mut raw = RawVirtuals::new();
    collect(&mut raw, &packages);
    debug!(
        "Collected {} virtuals from {} packages",
        raw.len(),
        packages.len()
    );
    Ok(finalize(raw))
}

/// Resolve virtuals through the mtime cache in `cache.dir`
pub fn resolve_cached<R: Repository>(
    repo: &R,
    cache: &CacheOptions,
) -> VirtdbResult<ResolvedVirtuals> {
    resolve_cached_with_stats(repo, cache).map(|(resolved, _)| resolved)
}

/// [`resolve_cached`], also reporting which categories were hit or rescanned
pub fn resolve_cached_with_stats<R: Repository>(
    repo: &R,
    cache: &CacheOptions,
) -> VirtdbResult<(ResolvedVirtuals, ResolveStats)> {
    let cache_file = cache.cache_file();
    let snapshot = CacheSnapshot::read(&cache_file)?;
    let master_mtime = mtime::mtime_of(repo.location())?;
    let mut stats = ResolveStats::default();

    if snapshot.master_mtime() == Some(master_mtime) {
        if let Some(raw) = decode_all(&snapshot) {
            debug!(
                "Repository unchanged, using {} cached categories",
                snapshot.len()
            );
            stats.fast_path = true;
            stats.cache_hits = snapshot.entries().map(|(cat, _)| cat.clone()).collect();
            return Ok((finalize(raw), stats));
        }
        debug!("Cache shortcut rejected, validating categories individually");
    }

    let current = repo.category_mtimes()?;
    let mut raw = RawVirtuals::new();
    let mut next = CacheSnapshot::new();
    next.set_master_mtime(master_mtime);

    for (category, &mtime) in &current {
        if let Some(records) = cached_records(&snapshot, category, mtime) {
            raw.extend(records);
            if let Some(entry) = snapshot.get(category) {
                next.insert(category.clone(), entry.clone());
            }
            stats.cache_hits.push(category.clone());
            continue;
        }

        let packages = repo.category_packages(category)?;
        let records: Vec<ProviderRecord> = provider_records(&packages).collect();
        debug!(
            "Rescanned {}: {} packages, {} providers",
            category,
            packages.len(),
            records.len()
        );
        next.insert(category.clone(), CategoryEntry::from_records(mtime, &records));
        raw.extend(records);
        stats.rescanned.push(category.clone());
    }

    stats.dropped = snapshot
        .entries()
        .filter(|(cat, _)| !current.contains_key(*cat))
        .map(|(cat, _)| cat.clone())
        .collect();

    if stats.needs_rewrite() {
        info!(
            "Updating virtuals cache: {} rescanned, {} dropped",
            stats.rescanned.len(),
            stats.dropped.len()
        );
        stats.cache_written = persist(&next, cache, &cache_file);
    }

    Ok((finalize(raw), stats))
}

/// Decode every cached category, or nothing if any line is unusable
fn decode_all(snapshot: &CacheSnapshot) -> Option<RawVirtuals> {
    let mut raw = RawVirtuals::new();
    for (category, entry) in snapshot.entries() {
        match entry.decode() {
            DecodeOutcome::Ok(records) => raw.extend(records),
            DecodeOutcome::Malformed => {
                debug!("Cached category {} is malformed", category);
                return None;
            }
            DecodeOutcome::ParseError(e) => {
                debug!("Cached category {} has a bad atom: {}", category, e);
                return None;
            }
        }
    }
    Some(raw)
}

/// Cached records for `category` if its line is current and decodes
fn cached_records(
    snapshot: &CacheSnapshot,
    category: &str,
    mtime: i64,
) -> Option<Vec<ProviderRecord>> {
    let entry = snapshot.get(category)?;
    if entry.mtime() != Some(mtime) {
        debug!("Category {} changed since last cache write", category);
        return None;
    }

    match entry.decode() {
        DecodeOutcome::Ok(records) => Some(records),
        DecodeOutcome::Malformed => {
            debug!("Cached category {} is malformed", category);
            None
        }
        DecodeOutcome::ParseError(e) => {
            debug!("Cached category {} has a bad atom: {}", category, e);
            None
        }
    }
}

/// Write `snapshot`; failures are logged and reported as `false`
fn persist(snapshot: &CacheSnapshot, cache: &CacheOptions, cache_file: &Path) -> bool {
    let result = fsutil::ensure_dir(&cache.dir, cache.dir_mode, cache.gid).and_then(|()| {
        fsutil::atomic_write(
            cache_file,
            snapshot.encode().as_bytes(),
            cache.file_mode,
            cache.gid,
        )
    });

    match result {
        Ok(()) => {
            debug!("Wrote virtuals cache {}", cache_file.display());
            true
        }
        Err(e) => {
            warn!("Virtuals cache not updated: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::error::VirtdbError;
    use crate::repo::tree::tests::write_package;
    use crate::repo::{TreePackage, TreeRepository};
    use crate::virtuals::mtime::tests::set_mtime;
    use crate::virtuals::Provider;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    const ROOT_MTIME: u64 = 5_000;

    struct Fixture {
        _temp: TempDir,
        repo: TreeRepository,
        cache: CacheOptions,
    }

    impl Fixture {
        fn root(&self) -> &Path {
            self.repo.location()
        }

        fn cache_text(&self) -> String {
            fs::read_to_string(self.cache.cache_file()).unwrap()
        }

        fn write_cache(&self, text: &str) {
            fs::create_dir_all(&self.cache.dir).unwrap();
            fs::write(self.cache.cache_file(), text).unwrap();
        }

        fn touch_category(&self, category: &str, secs: u64) {
            set_mtime(&self.root().join(category), secs);
        }
    }

    /// util: a-1.0, b-1.0 provide editor; c-2.0 provides editor and pager
    /// app: vim-9.0 provides editor; misc: nothing
    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write_package(&root, "util/a-1.0", "virtual/editor", &[]);
        write_package(&root, "util/b-1.0", "virtual/editor", &[]);
        write_package(
            &root,
            "util/c-2.0",
            "virtual/editor !minimal? ( virtual/pager )",
            &[],
        );
        write_package(&root, "app/vim-9.0", "virtual/editor", &[]);
        write_package(&root, "misc/empty-1", "", &[]);

        set_mtime(&root.join("util"), 1_000);
        set_mtime(&root.join("app"), 2_000);
        set_mtime(&root.join("misc"), 3_000);
        set_mtime(&root, ROOT_MTIME);

        let repo = TreeRepository::open(&root).unwrap();
        let cache = CacheOptions::new(temp.path().join("cache"));
        Fixture {
            _temp: temp,
            repo,
            cache,
        }
    }

    fn atom(s: &str) -> Atom {
        Atom::parse(s).unwrap()
    }

    #[test]
    fn cold_cache_matches_nocache() {
        let fx = fixture();
        let cold = resolve_nocache(&fx.repo).unwrap();
        let (warm, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();

        assert_eq!(cold, warm);
        assert!(!stats.fast_path);
        assert_eq!(stats.rescanned, vec!["app", "misc", "util"]);
        assert!(stats.cache_written);
        assert!(fx.cache.cache_file().is_file());
    }

    #[test]
    fn finalized_buckets() {
        let fx = fixture();
        let resolved = resolve_cached(&fx.repo, &fx.cache).unwrap();

        match resolved.provider("editor", "1.0").unwrap() {
            Provider::AnyOf(any) => {
                assert_eq!(any.atoms(), &[atom("=util/a-1.0"), atom("=util/b-1.0")])
            }
            other => panic!("expected AnyOf, got {:?}", other),
        }
        assert_eq!(
            resolved.provider("editor", "2.0"),
            Some(&Provider::Single(atom("=util/c-2.0")))
        );
        assert_eq!(
            resolved.provider("pager", "2.0"),
            Some(&Provider::Single(atom("=util/c-2.0")))
        );
    }

    #[test]
    fn second_run_rescans_nothing() {
        let fx = fixture();
        let (first, _) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        let written = fx.cache_text();

        let (second, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();

        assert_eq!(first, second);
        assert!(stats.fast_path);
        assert!(stats.rescanned.is_empty());
        assert!(!stats.cache_written);
        assert_eq!(fx.cache_text(), written);
    }

    #[test]
    fn written_cache_decodes_to_collected_records() {
        let fx = fixture();
        resolve_cached(&fx.repo, &fx.cache).unwrap();

        let snapshot = CacheSnapshot::read(&fx.cache.cache_file()).unwrap();
        assert_eq!(snapshot.master_mtime(), Some(ROOT_MTIME as i64));

        let mut decoded = RawVirtuals::new();
        for (_, entry) in snapshot.entries() {
            match entry.decode() {
                DecodeOutcome::Ok(records) => decoded.extend(records),
                other => panic!("unexpected decode result {:?}", other),
            }
        }

        let packages: Vec<TreePackage> = fx.repo.packages().unwrap();
        let mut collected = RawVirtuals::new();
        collect(&mut collected, &packages);

        assert_eq!(decoded, collected);
    }

    #[test]
    fn only_touched_category_is_rescanned() {
        let fx = fixture();
        resolve_cached(&fx.repo, &fx.cache).unwrap();
        let before = fx.cache_text();

        write_package(fx.root(), "util/d-1.0", "virtual/editor", &[]);
        fx.touch_category("util", 1_001);
        set_mtime(fx.root(), ROOT_MTIME + 1);

        let (resolved, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(!stats.fast_path);
        assert_eq!(stats.rescanned, vec!["util"]);
        assert_eq!(stats.cache_hits, vec!["app", "misc"]);
        assert!(resolved
            .provider("editor", "1.0")
            .unwrap()
            .matches(&atom("=util/d-1.0")));

        let after = fx.cache_text();
        let line = |text: &str, cat: &str| {
            text.lines()
                .find(|l| l.starts_with(&format!("{}\t", cat)))
                .map(str::to_string)
        };
        assert_eq!(line(&before, "app"), line(&after, "app"));
        assert_eq!(line(&before, "misc"), line(&after, "misc"));
        assert_ne!(line(&before, "util"), line(&after, "util"));
        assert!(after.ends_with(&format!(".\t{}\n", ROOT_MTIME + 1)));
    }

    #[test]
    fn unchanged_root_trusts_cache_wholesale() {
        let fx = fixture();
        resolve_cached(&fx.repo, &fx.cache).unwrap();

        // Category moves but the root does not: the shortcut still applies
        fx.touch_category("util", 1_001);
        let (_, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(stats.fast_path);
        assert!(stats.rescanned.is_empty());
    }

    #[test]
    fn wrong_field_count_forces_rescan() {
        let fx = fixture();
        fx.write_cache(
            "app\t2000\teditor\t9.0\n\
             misc\t3000\n\
             util\t1000\n\
             .\t1\n",
        );

        let (resolved, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert_eq!(stats.rescanned, vec!["app"]);
        assert_eq!(stats.cache_hits, vec!["misc", "util"]);
        assert_eq!(
            resolved.provider("editor", "9.0"),
            Some(&Provider::Single(atom("=app/vim-9.0")))
        );
        // util was trusted as cached (empty), proving per-category validation
        assert!(resolved.provider("editor", "1.0").is_none());
    }

    #[test]
    fn unparsable_atom_forces_rescan() {
        let fx = fixture();
        fx.write_cache(
            "app\t2000\teditor\t9.0\tvim-9.0\n\
             misc\t3000\n\
             util\t999\n\
             .\t1\n",
        );

        let (resolved, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert_eq!(stats.rescanned, vec!["app", "util"]);
        assert_eq!(resolved, resolve_nocache(&fx.repo).unwrap());

        let rewritten = CacheSnapshot::read(&fx.cache.cache_file()).unwrap();
        assert!(matches!(
            rewritten.get("app").unwrap().decode(),
            DecodeOutcome::Ok(_)
        ));
    }

    #[test]
    fn shortcut_is_all_or_nothing() {
        let fx = fixture();
        fs::create_dir(fx.root().join("x")).unwrap();
        set_mtime(&fx.root().join("x"), 4_000);
        set_mtime(fx.root(), ROOT_MTIME);

        // Sentinel matches, x is malformed, util carries stale ghost data
        fx.write_cache(&format!(
            "app\t2000\teditor\t9.0\t=app/vim-9.0\n\
             misc\t3000\n\
             util\t999\teditor\t9.9\t=util/ghost-9.9\n\
             x\t4000\tbroken\n\
             .\t{}\n",
            ROOT_MTIME
        ));

        let (resolved, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(!stats.fast_path);
        assert_eq!(stats.rescanned, vec!["util", "x"]);
        assert_eq!(stats.cache_hits, vec!["app", "misc"]);
        assert!(resolved.provider("editor", "9.9").is_none());
        assert_eq!(resolved, resolve_nocache(&fx.repo).unwrap());
    }

    #[test]
    fn vanished_categories_are_dropped() {
        let fx = fixture();
        resolve_cached(&fx.repo, &fx.cache).unwrap();

        fs::remove_dir_all(fx.root().join("misc")).unwrap();
        set_mtime(fx.root(), ROOT_MTIME + 1);

        let (_, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(stats.rescanned.is_empty());
        assert_eq!(stats.dropped, vec!["misc"]);
        assert!(stats.cache_written);
        assert!(!fx.cache_text().contains("misc"));
    }

    #[test]
    fn category_with_space_reaches_stable_cache() {
        let fx = fixture();
        let overlay = fx.root().join("local overlay");
        fs::create_dir(&overlay).unwrap();
        set_mtime(&overlay, 4_000);
        set_mtime(fx.root(), ROOT_MTIME);

        let (first, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(stats.rescanned.contains(&"local overlay".to_string()));

        let (second, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(stats.fast_path);
        assert!(stats.cache_hits.contains(&"local overlay".to_string()));
        assert_eq!(first, second);

        // Per-category validation agrees with the fast path
        set_mtime(fx.root(), ROOT_MTIME + 1);
        let (third, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(!stats.fast_path);
        assert!(stats.rescanned.is_empty());
        assert!(stats.dropped.is_empty());
        assert!(!stats.cache_written);
        assert_eq!(first, third);
    }

    #[test]
    fn stale_sentinel_without_changes_keeps_cache() {
        let fx = fixture();
        resolve_cached(&fx.repo, &fx.cache).unwrap();
        set_mtime(fx.root(), ROOT_MTIME + 1);

        let (_, stats) = resolve_cached_with_stats(&fx.repo, &fx.cache).unwrap();
        assert!(!stats.fast_path);
        assert!(!stats.needs_rewrite());
        assert!(!stats.cache_written);
    }

    #[test]
    fn unreadable_cache_is_an_error() {
        let fx = fixture();
        fs::create_dir_all(fx.cache.cache_file()).unwrap();

        let err = resolve_cached(&fx.repo, &fx.cache).unwrap_err();
        assert!(matches!(err, VirtdbError::CacheRead { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_cache_still_resolves() {
        let fx = fixture();
        let dangling = fx.cache.dir.with_file_name("dangling");
        std::os::unix::fs::symlink(fx.cache.dir.with_file_name("nowhere"), &dangling).unwrap();
        let cache = CacheOptions::new(&dangling);

        let (resolved, stats) = resolve_cached_with_stats(&fx.repo, &cache).unwrap();
        assert!(!stats.cache_written);
        assert_eq!(resolved, resolve_nocache(&fx.repo).unwrap());
    }

    /// Reports a category whose directory is already gone
    struct PhantomCategory<'a>(&'a TreeRepository);

    impl Repository for PhantomCategory<'_> {
        type Package = TreePackage;

        fn location(&self) -> &Path {
            self.0.location()
        }

        fn packages(&self) -> VirtdbResult<Vec<TreePackage>> {
            self.0.packages()
        }

        fn category_packages(&self, category: &str) -> VirtdbResult<Vec<TreePackage>> {
            self.0.category_packages(category)
        }

        fn category_mtimes(&self) -> VirtdbResult<BTreeMap<String, i64>> {
            let mut mtimes = self.0.category_mtimes()?;
            mtimes.insert("ghost".to_string(), 1);
            Ok(mtimes)
        }
    }

    #[test]
    fn vanished_category_contributes_nothing() {
        let fx = fixture();
        let repo = PhantomCategory(&fx.repo);

        let (resolved, stats) = resolve_cached_with_stats(&repo, &fx.cache).unwrap();
        assert!(stats.rescanned.contains(&"ghost".to_string()));
        assert_eq!(resolved, resolve_nocache(&fx.repo).unwrap());
    }
}
