//! Lookup command implementation.
//!
//! Prints the cached locator for a URL. Never fetches.

use crate::cli::args::LookupArgs;
use crate::config::FetcherConfig;
use crate::error::Result;
use crate::pipeline::lookup;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::store::Stores;

/// The lookup command implementation.
pub struct LookupCommand {
    config: FetcherConfig,
    args: LookupArgs,
}

impl LookupCommand {
    /// Create a new lookup command.
    pub fn new(config: &FetcherConfig, args: LookupArgs) -> Self {
        Self {
            config: config.clone(),
            args,
        }
    }
}

impl Command for LookupCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let stores = Stores::open(&self.config.storage, self.args.store.as_deref());

        match lookup(&self.args.url, &stores.meta)? {
            Some(locator) => {
                ui.output(&locator);
                Ok(CommandResult::success())
            }
            None => {
                ui.warning(&format!("{} is not cached", self.args.url));
                Ok(CommandResult::failure(1))
            }
        }
    }
}
