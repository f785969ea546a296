//! Resolve command - print the providers of each virtual

use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::config::Config;
use crate::error::VirtdbResult;
use crate::repo::TreeRepository;
use crate::virtuals::{ResolveStats, ResolvedBuckets, VirtualResolver};
use console::style;
use std::collections::BTreeMap;
use tracing::info;

/// Execute the resolve command
pub fn execute(args: ResolveArgs, config: &Config) -> VirtdbResult<()> {
    let location = config.repository_location(args.location.repo.as_deref())?;
    let repo = TreeRepository::open(location)?;

    let resolver = if args.no_cache || !config.cache.enabled {
        VirtualResolver::nocache(repo)
    } else {
        let cache = config.cache_options(args.location.cache_dir.as_deref());
        VirtualResolver::cached(repo, cache)
    };

    let selected = select(&resolver, &args.virtuals)?;

    if let Some(stats) = resolver.stats() {
        log_stats(stats);
    }

    match args.format {
        OutputFormat::Table => print_table(&selected),
        OutputFormat::Json => print_json(&selected)?,
        OutputFormat::Plain => print_plain(&selected),
    }

    Ok(())
}

/// Virtuals to print: everything, or just the names asked for
fn select<'a>(
    resolver: &'a VirtualResolver<TreeRepository>,
    names: &'a [String],
) -> VirtdbResult<BTreeMap<&'a str, &'a ResolvedBuckets>> {
    if names.is_empty() {
        return Ok(resolver
            .virtuals()?
            .iter()
            .map(|(name, buckets)| (name.as_str(), buckets))
            .collect());
    }

    let mut selected = BTreeMap::new();
    for name in names {
        let name = bare_name(name);
        let buckets = resolver.providers(name)?;
        selected.insert(name, buckets);
    }
    Ok(selected)
}

/// `virtual/editor` and `editor` name the same virtual
fn bare_name(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, pkg)| pkg)
}

fn log_stats(stats: &ResolveStats) {
    if stats.fast_path {
        info!("Cache current, {} categories reused", stats.cache_hits.len());
        return;
    }
    info!(
        "{} categories from cache, {} rescanned, {} dropped",
        stats.cache_hits.len(),
        stats.rescanned.len(),
        stats.dropped.len()
    );
    if stats.cache_written {
        info!("Cache rewritten");
    }
}

fn print_table(selected: &BTreeMap<&str, &ResolvedBuckets>) {
    if selected.is_empty() {
        println!("No virtuals found.");
        return;
    }

    println!("{:<24} {:<16} {}", "VIRTUAL", "VERSION", "PROVIDER");
    println!("{}", "-".repeat(72));

    let mut rows = 0;
    for (name, buckets) in selected {
        for (version, provider) in buckets.iter() {
            println!(
                "{:<24} {:<16} {}",
                style(name).cyan(),
                version,
                provider
            );
            rows += 1;
        }
    }

    println!();
    println!("Total: {} virtual(s), {} provider bucket(s)", selected.len(), rows);
}

fn print_json(selected: &BTreeMap<&str, &ResolvedBuckets>) -> VirtdbResult<()> {
    let json = serde_json::to_string_pretty(selected)?;
    println!("{}", json);
    Ok(())
}

fn print_plain(selected: &BTreeMap<&str, &ResolvedBuckets>) {
    for (name, buckets) in selected {
        for (version, provider) in buckets.iter() {
            for atom in provider.atoms() {
                println!("{}\t{}\t{}", name, version, atom);
            }
        }
    }
}
