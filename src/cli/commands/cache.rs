//! Cache command - inspect or clear the virtuals cache

use crate::cli::args::{CacheAction, CacheArgs, LocationArgs};
use crate::config::Config;
use crate::error::{VirtdbError, VirtdbResult};
use crate::repo::{Repository, TreeRepository};
use crate::virtuals::mtime;
use crate::virtuals::{CacheSnapshot, CategoryEntry, DecodeOutcome};
use console::style;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Execute the cache command
pub fn execute(args: CacheArgs, config: &Config) -> VirtdbResult<()> {
    match args.action {
        CacheAction::Status { location } => show_status(&location, config),
        CacheAction::Clear { cache_dir } => clear_cache(cache_dir.as_deref(), config),
    }
}

/// State of one cached category relative to the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Valid,
    Stale,
    Malformed,
    Unparsable,
    Removed,
}

impl EntryState {
    fn label(self) -> console::StyledObject<&'static str> {
        match self {
            Self::Valid => style("valid").green(),
            Self::Stale => style("stale").yellow(),
            Self::Malformed => style("malformed").red(),
            Self::Unparsable => style("unparsable").red(),
            Self::Removed => style("removed").dim(),
        }
    }
}

fn classify(entry: &CategoryEntry, current: Option<i64>) -> EntryState {
    let Some(current) = current else {
        return EntryState::Removed;
    };
    match entry.decode() {
        DecodeOutcome::Malformed => EntryState::Malformed,
        DecodeOutcome::ParseError(_) => EntryState::Unparsable,
        DecodeOutcome::Ok(_) if entry.mtime() != Some(current) => EntryState::Stale,
        DecodeOutcome::Ok(_) => EntryState::Valid,
    }
}

fn show_status(location: &LocationArgs, config: &Config) -> VirtdbResult<()> {
    let root = config.repository_location(location.repo.as_deref())?;
    let repo = TreeRepository::open(root)?;
    let cache = config.cache_options(location.cache_dir.as_deref());
    let cache_file = cache.cache_file();

    let snapshot = CacheSnapshot::read(&cache_file)?;
    let categories = repo.category_mtimes()?;
    let master = mtime::mtime_of(repo.location())?;

    println!("Cache: {}", cache_file.display());
    if snapshot.is_empty() && snapshot.master_mtime().is_none() {
        println!("No cache entries.");
        return Ok(());
    }

    let sentinel = if snapshot.master_mtime() == Some(master) {
        style("current").green()
    } else {
        style("outdated").yellow()
    };
    println!("Repository mtime: {}", sentinel);
    println!();

    println!("{:<24} {:<12} {:<8} {}", "CATEGORY", "STATE", "RECORDS", "MTIME");
    println!("{}", "-".repeat(60));

    for (category, entry) in snapshot.entries() {
        let state = classify(entry, categories.get(category).copied());
        let mtime = entry
            .mtime()
            .map_or_else(|| "-".to_string(), |m| m.to_string());
        println!(
            "{:<24} {:<12} {:<8} {}",
            category,
            state.label(),
            entry.record_count(),
            mtime
        );
    }

    let uncached = categories
        .keys()
        .filter(|category| snapshot.get(category).is_none())
        .count();

    println!();
    println!(
        "Total: {} cached categor{}, {} not yet cached",
        snapshot.len(),
        if snapshot.len() == 1 { "y" } else { "ies" },
        uncached
    );

    Ok(())
}

fn clear_cache(dir: Option<&Path>, config: &Config) -> VirtdbResult<()> {
    let cache = config.cache_options(dir);
    let cache_file = cache.cache_file();

    match fs::remove_file(&cache_file) {
        Ok(()) => {
            println!("{} Removed {}", style("✓").green(), cache_file.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No cache file at {}", cache_file.display());
            println!("No cache to clear.");
            Ok(())
        }
        Err(e) => Err(VirtdbError::io(format!("removing {}", cache_file.display()), e)),
    }
}
