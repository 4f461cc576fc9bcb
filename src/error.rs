//! # Error Handling
//!
//! This module defines the centralized error type for the `crucible` library.
//! It uses `thiserror` to derive a single `Error` enum whose variants map onto
//! the failure kinds a workspace operation can hit:
//!
//! - **Validation**: unknown repository names, malformed input manifests.
//! - **Network / checkout**: the hosting service is unreachable, a commit
//!   cannot be found, a `git` invocation fails.
//! - **Filesystem**: permission problems, failed writes or removals.
//! - **Parse**: malformed YAML, TOML or Lean manifests.
//!
//! Variants that a user can act on carry an optional `hint`, rendered on its
//! own line after the message.

use std::path::PathBuf;
use thiserror::Error;

fn render_hint(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!("\n  hint: {}", h))
        .unwrap_or_default()
}

/// Main error type for crucible operations
#[derive(Error, Debug)]
pub enum Error {
    /// A repository name that is not in the registry was supplied where a
    /// registry entry is required.
    #[error("Unknown repository '{name}'{}", render_hint(hint))]
    UnknownRepository {
        name: String,
        /// Usually the list of known names
        hint: Option<String>,
    },

    /// Input was structurally valid but semantically unacceptable.
    #[error("Validation error: {message}{}", render_hint(hint))]
    Validation {
        message: String,
        hint: Option<String>,
    },

    /// A structured file could not be parsed.
    #[error("Parse error in {source_name}: {message}")]
    Parse {
        /// File path or `<stdin>`
        source_name: String,
        message: String,
    },

    /// Fetching a repository at a commit failed.
    #[error("Checkout of {name} at {sha} failed: {message}{}", render_hint(hint))]
    Checkout {
        name: String,
        sha: String,
        message: String,
        hint: Option<String>,
    },

    /// An error occurred while executing a Git command.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// The hosting service could not be reached or answered unexpectedly.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// A filesystem operation on a specific path failed.
    #[error("Filesystem operation error on {}: {message}", path.display())]
    Filesystem { path: PathBuf, message: String },

    /// A lakefile could not be rewritten or serialized.
    #[error("Lakefile error in {}: {message}", path.display())]
    Lakefile { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn filesystem(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True for errors that reject user input outright, as opposed to
    /// per-entry network or filesystem failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnknownRepository { .. } | Error::Validation { .. } | Error::Parse { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
