//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use crate::cli::args::Commands;
use crate::config::FetcherConfig;
use crate::error::Result;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    config: FetcherConfig,
}

impl CommandDispatcher {
    /// Create a new dispatcher with the loaded configuration.
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Get the configuration commands start from.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Dispatch and execute a command.
    pub fn dispatch(
        &self,
        command: &Commands,
        ui: &mut dyn UserInterface,
    ) -> Result<CommandResult> {
        match command {
            Commands::Fetch(args) => {
                let cmd = super::fetch::FetchCommand::new(&self.config, args.clone());
                cmd.execute(ui)
            }
            Commands::Lookup(args) => {
                let cmd = super::lookup::LookupCommand::new(&self.config, args.clone());
                cmd.execute(ui)
            }
            Commands::Meta(args) => {
                let cmd = super::meta::MetaCommand::new(&self.config, args.clone());
                cmd.execute(ui)
            }
        }
    }
}
