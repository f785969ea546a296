//! Memoizing front end for virtuals resolution

use super::update::{resolve_cached_with_stats, resolve_nocache, CacheOptions, ResolveStats};
use super::{ResolvedBuckets, ResolvedVirtuals};
use crate::error::{VirtdbError, VirtdbResult};
use crate::repo::Repository;
use std::cell::OnceCell;

/// How a resolver computes its map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveMode {
    /// Scan the whole repository
    NoCache,
    /// Go through the mtime cache
    Cached(CacheOptions),
}

/// Lazily resolved virtuals for one repository
///
/// The map is computed on the first successful call to
/// [`virtuals`](Self::virtuals) and kept for the life of the instance. Later
/// repository changes are not picked up; build a new resolver for fresh
/// data. A failed computation is not kept, so the next call retries.
pub struct VirtualResolver<R> {
    repo: R,
    mode: ResolveMode,
    resolved: OnceCell<ResolvedVirtuals>,
    stats: OnceCell<ResolveStats>,
}

impl<R: Repository> VirtualResolver<R> {
    /// Resolver that always scans the full repository
    pub fn nocache(repo: R) -> Self {
        Self::with_mode(repo, ResolveMode::NoCache)
    }

    /// Resolver backed by the cache described by `cache`
    pub fn cached(repo: R, cache: CacheOptions) -> Self {
        Self::with_mode(repo, ResolveMode::Cached(cache))
    }

    pub fn with_mode(repo: R, mode: ResolveMode) -> Self {
        Self {
            repo,
            mode,
            resolved: OnceCell::new(),
            stats: OnceCell::new(),
        }
    }

    /// The resolved map, computed on first use
    pub fn virtuals(&self) -> VirtdbResult<&ResolvedVirtuals> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }

        let resolved = match &self.mode {
            ResolveMode::NoCache => resolve_nocache(&self.repo)?,
            ResolveMode::Cached(cache) => {
                let (resolved, stats) = resolve_cached_with_stats(&self.repo, cache)?;
                let _ = self.stats.set(stats);
                resolved
            }
        };
        Ok(self.resolved.get_or_init(|| resolved))
    }

    /// Version buckets for one virtual
    pub fn providers(&self, virtual_name: &str) -> VirtdbResult<&ResolvedBuckets> {
        self.virtuals()?
            .get(virtual_name)
            .ok_or_else(|| VirtdbError::VirtualNotFound(virtual_name.to_string()))
    }

    /// Cache statistics from the computation, if it went through the cache
    pub fn stats(&self) -> Option<&ResolveStats> {
        self.stats.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}
