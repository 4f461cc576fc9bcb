//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_file("aesop/lakefile.toml", "name = \"aesop\"");
//!     fixture.command().arg("clean").assert().success();
//! }
//! ```
//!
//! Checkout tests serve repositories from local git repositories under
//! `<fixture>/mirrors/<org>/<repo>` and point `--git-base-url` at them, so
//! they need a `git` binary but no network.

use assert_fs::prelude::*;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::lakefiles;
    #[allow(unused_imports)]
    pub use super::{git_available, should_skip_network_tests};
    pub use super::TestFixture;
}

/// Lakefile snippets for testing.
#[allow(dead_code)]
pub mod lakefiles {
    /// `aesop` requiring `batteries` from git.
    pub const AESOP_TOML: &str = r#"name = "aesop"
defaultTargets = ["Aesop"]

[[require]]
name = "batteries"
git = "https://github.com/leanprover-community/batteries"
rev = "main"

[[lean_lib]]
name = "Aesop"
"#;

    /// `batteries` with no dependencies.
    pub const BATTERIES_TOML: &str = r#"name = "batteries"

[[lean_lib]]
name = "Batteries"
"#;

    /// A mathlib-style Lean lakefile requiring several packages by scope.
    pub const MATHLIB_LEAN: &str = r#"import Lake

open Lake DSL

require "leanprover-community" / "batteries" @ git "main"
require "leanprover-community" / "aesop" @ git "master"
require "leanprover-community" / "plausible" @ git "main"

package mathlib where
  leanOptions := #[]

@[default_target]
lean_lib Mathlib
"#;

    /// Not a valid TOML document.
    pub const BROKEN_TOML: &str = "name = \"broken\n[[require]\n";
}

/// Check if network tests should be skipped.
///
/// Returns `true` if the `SKIP_NETWORK_TESTS` environment variable is set.
#[allow(dead_code)]
pub fn should_skip_network_tests() -> bool {
    env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// Whether a usable `git` binary is on the PATH.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A test fixture that provides a temporary workspace directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add an empty directory.
    #[allow(dead_code)]
    pub fn with_dir(self, path: &str) -> Self {
        self.temp_dir
            .child(path)
            .create_dir_all()
            .expect("Failed to create directory");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The workspace the commands operate on.
    #[allow(dead_code)]
    pub fn workspace(&self) -> PathBuf {
        self.temp_dir.path().join("workspace")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Base URL serving the repositories created with [`Self::mirror`].
    #[allow(dead_code)]
    pub fn mirror_base_url(&self) -> String {
        format!("file://{}", self.path().join("mirrors").display())
    }

    /// Create a git repository at `mirrors/<org>/<repo>` holding `files`
    /// and return the sha of its single commit on `main`.
    #[allow(dead_code)]
    pub fn mirror(&self, org: &str, repo: &str, files: &[(&str, &str)]) -> String {
        let dir = self.path().join("mirrors").join(org).join(repo);
        std::fs::create_dir_all(&dir).expect("Failed to create mirror directory");
        init_git_repo(&dir, files).expect("Failed to create mirror repository")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a command running in the fixture directory with colors off and
    /// no workspace override inherited from the environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("crucible");
        cmd.current_dir(self.path())
            .env_remove("CRUCIBLE_WORKSPACE")
            .env_remove("CRUCIBLE_GIT_BASE_URL")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }

    /// A command operating on [`Self::workspace`] and fetching from the
    /// fixture's mirrors.
    #[allow(dead_code)]
    pub fn workspace_command(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("--workspace")
            .arg(self.workspace())
            .arg("--git-base-url")
            .arg(self.mirror_base_url());
        cmd
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if !output.status.success() {
        return Err(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Initialize a git repository at `dir` with one commit of `files`.
///
/// Returns the commit sha.
pub fn init_git_repo(dir: &Path, files: &[(&str, &str)]) -> Result<String, Box<dyn std::error::Error>> {
    git(dir, &["init", "-b", "main"])?;
    git(dir, &["config", "user.email", "test@example.com"])?;
    git(dir, &["config", "user.name", "Test User"])?;
    // Disable commit signing for tests
    git(dir, &["config", "commit.gpgsign", "false"])?;

    for (path, content) in files {
        let file = dir.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file, content)?;
    }

    git(dir, &["add", "."])?;
    git(dir, &["commit", "--allow-empty", "-m", "Initial commit"])?;
    git(dir, &["rev-parse", "HEAD"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_file() {
        let fixture = TestFixture::new().with_file("aesop/lakefile.toml", "name = \"aesop\"");
        assert!(fixture.path().join("aesop/lakefile.toml").exists());
    }

    #[test]
    fn test_lakefile_snippets_are_valid_toml() {
        for content in [lakefiles::AESOP_TOML, lakefiles::BATTERIES_TOML] {
            content
                .parse::<toml::Table>()
                .expect("Snippet should be valid TOML");
        }
        assert!(lakefiles::BROKEN_TOML.parse::<toml::Table>().is_err());
    }
}
