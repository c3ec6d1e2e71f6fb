//! Terminal output for the CLI.
//!
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] writing to the real terminal
//! - [`MockUI`] capturing output in tests
//!
//! # Example
//!
//! ```
//! use cached_http_fetcher::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.output("file:///tmp/cache/abc");
//! ui.success("Done");
//! assert_eq!(ui.outputs(), ["file:///tmp/cache/abc"]);
//! ```

pub mod mock;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use terminal::TerminalUI;
pub use theme::{should_use_colors, Theme};

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Status messages and results.
    #[default]
    Normal,
    /// Results and errors only.
    Quiet,
}

impl OutputMode {
    /// Check if this mode shows status messages.
    pub fn shows_status(&self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Print a command result. Shown in every mode.
    fn output(&mut self, text: &str);

    /// Display a status message.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);
}
