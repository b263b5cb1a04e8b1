//! CLI command definitions
//!
//! Defines the clap commands for the harness.

use clap::Subcommand;

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Commands {
    /// Run the configured test cases (default)
    #[default]
    Run,

    /// List known test cases and whether they are enabled
    List,
}
