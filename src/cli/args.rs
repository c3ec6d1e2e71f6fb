//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bulk HTTP fetcher with conditional requests and an on-disk cache.
#[derive(Debug, Parser)]
#[command(name = "cached-http-fetcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true, env = "FETCHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch every URL in a list and cache the results
    Fetch(FetchArgs),

    /// Print the cached locator for a URL if it is fresh
    Lookup(LookupArgs),

    /// Print the stored meta record for a URL
    Meta(MetaArgs),
}

/// Arguments for the `fetch` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FetchArgs {
    /// File with one URL per line, or `-` for stdin
    #[arg(value_name = "URL_FILE")]
    pub url_file: PathBuf,

    /// Cache directory (overrides storage.root)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Run fetch and commit passes on one thread
    #[arg(long)]
    pub single: bool,

    /// Number of fetch workers
    #[arg(long, value_name = "N")]
    pub fetchers: Option<usize>,

    /// Number of commit workers
    #[arg(long, value_name = "N")]
    pub committers: Option<usize>,

    /// Fetches each worker may start per window (0 = unlimited)
    #[arg(long, value_name = "N")]
    pub max_fetch_count: Option<u32>,

    /// Rate limit window in seconds
    #[arg(long, value_name = "SECS")]
    pub window: Option<u64>,

    /// Minimum cache lifetime in seconds
    #[arg(long, value_name = "SECS")]
    pub min_cache_age: Option<i64>,

    /// max-age hint stored with each body, in seconds
    #[arg(long, value_name = "SECS")]
    pub content_max_age: Option<i64>,
}

/// Arguments for the `lookup` command.
#[derive(Debug, Clone, clap::Args)]
pub struct LookupArgs {
    /// Source URL exactly as it was fetched
    pub url: String,

    /// Cache directory (overrides storage.root)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,
}

/// Arguments for the `meta` command.
#[derive(Debug, Clone, clap::Args)]
pub struct MetaArgs {
    /// Source URL exactly as it was fetched
    pub url: String,

    /// Cache directory (overrides storage.root)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
