//! Fetch command implementation.
//!
//! Provides `cached-http-fetcher fetch <URL_FILE>`.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::cli::args::FetchArgs;
use crate::config::{validate, FetcherConfig};
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::store::Stores;

/// Split a URL list into entries: one per line, blank lines and `#`
/// comments skipped.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a URL list from a file, or from stdin when `path` is `-`.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read URL list from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL list {}", path.display()))?
    };

    Ok(parse_url_list(&content))
}

/// The fetch command implementation.
pub struct FetchCommand {
    config: FetcherConfig,
    args: FetchArgs,
}

impl FetchCommand {
    /// Create a new fetch command.
    pub fn new(config: &FetcherConfig, args: FetchArgs) -> Self {
        Self {
            config: config.clone(),
            args,
        }
    }

    /// Configuration with command-line overrides applied.
    pub fn effective_config(&self) -> FetcherConfig {
        let mut config = self.config.clone();
        let args = &self.args;

        if let Some(store) = &args.store {
            config.storage.root = store.clone();
        }
        if let Some(fetchers) = args.fetchers {
            config.workers.fetchers = Some(fetchers);
        }
        if let Some(committers) = args.committers {
            config.workers.committers = Some(committers);
        }
        if let Some(count) = args.max_fetch_count {
            config.rate_limit.max_fetch_count = count;
        }
        if let Some(window) = args.window {
            config.rate_limit.window_seconds = window;
        }
        if let Some(age) = args.min_cache_age {
            config.min_cache_age = age;
        }
        if let Some(age) = args.content_max_age {
            config.content_max_age = age;
        }

        config
    }
}

impl Command for FetchCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.effective_config();
        validate(&config)?;
        debug!("Effective config: {:?}", config);

        let urls = read_url_list(&self.args.url_file)?;
        if urls.is_empty() {
            ui.warning("No URLs to fetch");
            return Ok(CommandResult::success());
        }

        let stores = Stores::open(&config.storage, None);
        ui.message(&format!(
            "Fetching {} urls into {}",
            urls.len(),
            config.storage.root.display()
        ));

        let pipeline = Pipeline::new(config.fetch_options(), config.http_options())?;
        let summary = if self.args.single {
            pipeline.run_single(&urls, &stores.meta, &stores.content)
        } else {
            pipeline.run(&urls, &stores.meta, &stores.content)
        };

        ui.output(&summary.to_string());
        if summary.is_clean() {
            ui.success("Fetch complete");
        } else {
            ui.warning(&format!(
                "{} fetches and {} commits failed; see log for details",
                summary.failed, summary.commit_failed
            ));
        }

        Ok(CommandResult::success())
    }
}
