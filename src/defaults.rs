//! Default values and well-known names for crucible workspaces.
//!
//! This module provides centralized names used across commands, ensuring the
//! checkout, lakefile and clean commands agree on which files they own.

use std::path::PathBuf;

/// The resolved-manifest file written by `checkout` at the workspace root.
pub const CHECKOUT_MANIFEST: &str = "checkout.yaml";

/// The synthesized root aggregator lakefile.
pub const ROOT_LAKEFILE: &str = "lakefile.toml";

/// Generated by `lake update` in the workspace root.
pub const ROOT_LAKE_MANIFEST: &str = "lake-manifest.json";

/// Toolchain pin that lake may place in the workspace root.
pub const ROOT_TOOLCHAIN: &str = "lean-toolchain";

/// Root artifacts removed by `clean` besides the checkout manifest.
pub const GENERATED_ROOT_FILES: &[&str] = &[ROOT_LAKEFILE, ROOT_LAKE_MANIFEST, ROOT_TOOLCHAIN];

/// Name prefix of the temporary directories `checkout` fetches into before
/// moving a tree into place. Leftovers from an interrupted run are removed by
/// `clean`.
pub const STAGING_PREFIX: &str = ".crucible-staging-";

/// Package name for a freshly created root lakefile.
pub const ROOT_PACKAGE_NAME: &str = "crucible-workspace";

/// Package version for a freshly created root lakefile.
pub const ROOT_PACKAGE_VERSION: &str = "0.1.0";

/// Hosting service that repository URLs are formed against.
pub const DEFAULT_GIT_BASE_URL: &str = "https://github.com";

/// Environment variable overriding the workspace root.
pub const WORKSPACE_ENV: &str = "CRUCIBLE_WORKSPACE";

/// Environment variable overriding the hosting base URL.
pub const GIT_BASE_URL_ENV: &str = "CRUCIBLE_GIT_BASE_URL";

/// Returns the default workspace root.
///
/// This is the current directory; falls back to `.` if it cannot be read
/// (for example when it was deleted underneath the process).
pub fn default_workspace_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
