//! # CLI Command Implementations
//!
//! Each subcommand of the `crucible` command-line tool lives in its own
//! file with:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` plus the shared
//!   [`Context`] and performs the command's logic by calling into the
//!   `crucible` library.
//!
//! Commands that process several entries print a per-entry summary and then
//! fail with a non-zero exit if any entry failed.

use std::path::PathBuf;

use crucible::output::OutputConfig;

pub mod checkout;
pub mod clean;
pub mod lakefile;

/// Settings from the global flags, shared by every command.
#[derive(Debug)]
pub struct Context {
    pub workspace: PathBuf,
    pub git_base_url: String,
    pub output: OutputConfig,
}
