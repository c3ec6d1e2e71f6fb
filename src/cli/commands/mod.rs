//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results. Commands are
//! routed by [`CommandDispatcher`] and share the loaded configuration.

pub mod dispatcher;
pub mod fetch;
pub mod lookup;
pub mod meta;
pub mod store;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
pub use store::Stores;
