//! # Hosting Service Access
//!
//! The checkout resolver talks to the hosting service through the
//! `GitOperations` trait rather than calling `git` directly. This keeps the
//! resolution and materialization logic testable: the main application uses
//! `DefaultGitOperations`, which wraps the system `git` command, while tests
//! inject mock implementations that simulate missing commits, unreachable
//! remotes or partial failures without touching the network.

use std::path::Path;

use crate::error::Result;
use crate::git::RemoteHead;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations {
    /// Returns the default branch of the remote and its head commit.
    fn default_branch_head(&self, url: &str) -> Result<RemoteHead>;

    /// Materializes the tree of `sha` into `target_dir`, without history.
    ///
    /// `target_dir` does not exist when this is called.
    fn fetch_commit(&self, url: &str, sha: &str, target_dir: &Path) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn default_branch_head(&self, url: &str) -> Result<RemoteHead> {
        crate::git::default_branch_head(url)
    }

    fn fetch_commit(&self, url: &str, sha: &str, target_dir: &Path) -> Result<()> {
        crate::git::fetch_commit(url, sha, target_dir)
    }
}
