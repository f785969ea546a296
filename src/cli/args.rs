//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// virtdb - virtual package provider cache
///
/// Resolves virtual packages to their concrete providers, keeping a
/// per-category mtime cache so only changed categories are rescanned.
#[derive(Parser, Debug)]
#[command(name = "virtdb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VIRTDB_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve virtuals to their providers
    Resolve(ResolveArgs),

    /// Inspect or clear the virtuals cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Repository and cache location overrides shared by commands
#[derive(Parser, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Repository root (defaults to [repository] location)
    #[arg(short, long, env = "VIRTDB_REPO")]
    pub repo: Option<PathBuf>,

    /// Cache directory (defaults to [cache] dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub location: LocationArgs,

    /// Scan the whole repository instead of using the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Only show these virtuals
    pub virtuals: Vec<String>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Compare cached categories against the repository
    Status {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Delete the cache file
    Clear {
        /// Cache directory (defaults to [cache] dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for resolved virtuals
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one provider atom per line)
    Plain,
}
