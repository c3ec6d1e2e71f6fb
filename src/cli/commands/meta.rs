//! Meta command implementation.
//!
//! Provides `cached-http-fetcher meta <URL> [--json]`.

use chrono::{DateTime, Utc};

use crate::cache::{load_meta, Meta};
use crate::cli::args::MetaArgs;
use crate::config::FetcherConfig;
use crate::error::{FetcherError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::store::Stores;

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// Human-readable lines describing `meta` as of `now`.
pub fn describe(meta: &Meta, now: i64) -> Vec<String> {
    let none = || "-".to_string();
    let status = if meta.is_fresh(now) {
        format!("fresh ({}s left)", meta.remaining_ttl(now))
    } else {
        "stale".to_string()
    };

    vec![
        format!(
            "Locator:       {}",
            meta.cached_locator.clone().unwrap_or_else(|| "(uncacheable)".into())
        ),
        format!("ETag:          {}", meta.etag.clone().unwrap_or_else(none)),
        format!(
            "Last-Modified: {}",
            meta.last_modified.clone().unwrap_or_else(none)
        ),
        format!(
            "Content hash:  {}",
            meta.content_hash.clone().unwrap_or_else(none)
        ),
        format!("Fetched at:    {}", format_timestamp(meta.fetched_at)),
        format!("Expires at:    {}", format_timestamp(meta.expired_at)),
        format!("Status:        {}", status),
    ]
}

/// The meta command implementation.
pub struct MetaCommand {
    config: FetcherConfig,
    args: MetaArgs,
}

impl MetaCommand {
    /// Create a new meta command.
    pub fn new(config: &FetcherConfig, args: MetaArgs) -> Self {
        Self {
            config: config.clone(),
            args,
        }
    }
}

impl Command for MetaCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let stores = Stores::open(&self.config.storage, self.args.store.as_deref());

        let Some(meta) = load_meta(&self.args.url, &stores.meta)? else {
            ui.warning(&format!("No meta record for {}", self.args.url));
            return Ok(CommandResult::failure(1));
        };

        if self.args.json {
            let json =
                serde_json::to_string_pretty(&meta).map_err(|e| FetcherError::Other(e.into()))?;
            ui.output(&json);
        } else {
            for line in describe(&meta, Utc::now().timestamp()) {
                ui.output(&line);
            }
        }

        Ok(CommandResult::success())
    }
}
