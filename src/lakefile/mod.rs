//! # Lakefile Rewriting
//!
//! Wires the checked-out repositories of a workspace together so that a
//! single `lake build` at the workspace root builds all of them against each
//! other instead of against remote copies.
//!
//! ## Algorithm
//!
//! 1. Find the local checkouts: registry names with a directory of the same
//!    name at the workspace root ([`LocalCheckouts::scan`]).
//! 2. For each checkout, process every manifest found at the fixed locations
//!    in [`MANIFEST_FILES`].
//! 3. Each dependency naming another local checkout is rewritten to a
//!    relative path (`../<name>` for a lakefile at the top of a checkout) and
//!    loses its remote-fetch declaration. Dependencies on anything else are
//!    left exactly as they were.
//! 4. A root `lakefile.toml` requiring every local checkout is written.
//!
//! Rewriting is idempotent: a dependency that already points at its sibling
//! checkout is recognised and left alone, and files are only written when
//! their content changes.
//!
//! A manifest that cannot be read, parsed or written is recorded in the
//! [`RewriteReport`] and skipped; the remaining manifests and the root
//! lakefile are still processed.

pub mod lean;
pub mod toml;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::defaults::{ROOT_LAKEFILE, ROOT_PACKAGE_NAME, ROOT_PACKAGE_VERSION};
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Manifest locations inside a checkout, in preference order for reading the
/// package name.
pub const MANIFEST_FILES: &[&str] = &["lakefile.toml", "lakefile.lean"];

/// The set of repositories present as directories at the workspace root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCheckouts {
    names: BTreeSet<String>,
}

impl LocalCheckouts {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Registry entries that have a directory at the workspace root.
    pub fn scan(workspace: &Path, registry: &Registry) -> Self {
        Self::new(
            registry
                .all()
                .iter()
                .filter(|entry| workspace.join(&entry.name).is_dir())
                .map(|entry| entry.name.clone()),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LakefileKind {
    Toml,
    Lean,
}

impl LakefileKind {
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(LakefileKind::Toml),
            "lean" => Some(LakefileKind::Lean),
            _ => None,
        }
    }
}

/// Relative path from a manifest's directory back to the workspace root.
///
/// `manifest` is relative to its checkout, so `lakefile.toml` yields `../`
/// and `sub/lakefile.toml` yields `../../`.
pub fn workspace_prefix(manifest: &Path) -> String {
    let depth = manifest
        .parent()
        .map(|p| {
            p.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);
    "../".repeat(depth + 1)
}

/// Rewrite one manifest in place. Returns whether the file changed.
pub fn rewrite_manifest(path: &Path, local: &LocalCheckouts, prefix: &str) -> Result<bool> {
    let kind = LakefileKind::of(path).ok_or_else(|| Error::Lakefile {
        path: path.to_path_buf(),
        message: "not a lakefile".to_string(),
    })?;
    let content = fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;

    let rewritten = match kind {
        LakefileKind::Toml => self::toml::rewrite(&content, local, prefix).map_err(|e| {
            Error::Parse {
                source_name: path.display().to_string(),
                message: e.to_string(),
            }
        })?,
        LakefileKind::Lean => self::lean::rewrite(&content, local, prefix)?,
    };

    match rewritten {
        Some(new_content) => {
            fs::write(path, new_content).map_err(|e| Error::filesystem(path, e))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Debug)]
pub enum ManifestStatus {
    Modified,
    Unchanged,
    Failed(Error),
}

#[derive(Debug)]
pub struct ManifestOutcome {
    /// The checkout the manifest belongs to
    pub repository: String,
    pub path: PathBuf,
    pub status: ManifestStatus,
}

/// The synthesized root lakefile.
#[derive(Debug)]
pub struct RootLakefile {
    pub path: PathBuf,
    /// `(package name, relative path)` per local checkout
    pub requires: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct RewriteReport {
    pub local: LocalCheckouts,
    pub manifests: Vec<ManifestOutcome>,
    pub root: Result<RootLakefile>,
}

impl RewriteReport {
    pub fn modified(&self) -> impl Iterator<Item = &ManifestOutcome> {
        self.manifests
            .iter()
            .filter(|m| matches!(m.status, ManifestStatus::Modified))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ManifestOutcome> {
        self.manifests
            .iter()
            .filter(|m| matches!(m.status, ManifestStatus::Failed(_)))
    }

    /// True if any manifest or the root lakefile could not be processed.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some() || self.root.is_err()
    }

    /// Checkouts with at least one modified manifest, deduplicated.
    pub fn modified_repositories(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.modified().map(|m| m.repository.as_str()).collect();
        set.into_iter().collect()
    }
}

/// Rewrite every manifest of every local checkout, then write the root
/// lakefile.
pub fn rewrite_workspace(workspace: &Path, registry: &Registry) -> RewriteReport {
    let local = LocalCheckouts::scan(workspace, registry);
    info!("{} local checkouts: {:?}", local.len(), local);

    let mut manifests = Vec::new();
    for repository in local.iter() {
        let checkout = workspace.join(repository);
        let mut found = false;

        for manifest in MANIFEST_FILES {
            let path = checkout.join(manifest);
            if !path.is_file() {
                continue;
            }
            found = true;

            let prefix = workspace_prefix(Path::new(manifest));
            let status = match rewrite_manifest(&path, &local, &prefix) {
                Ok(true) => ManifestStatus::Modified,
                Ok(false) => ManifestStatus::Unchanged,
                Err(e) => {
                    warn!("skipping {}: {}", path.display(), e);
                    ManifestStatus::Failed(e)
                }
            };
            manifests.push(ManifestOutcome {
                repository: repository.to_string(),
                path,
                status,
            });
        }

        if !found {
            debug!("{} has no lakefile", repository);
        }
    }

    let root = write_root_lakefile(workspace, &local);
    RewriteReport {
        local,
        manifests,
        root,
    }
}

/// The package name a checkout declares, if any of its manifests say.
pub fn package_name_of(checkout: &Path) -> Option<String> {
    MANIFEST_FILES.iter().find_map(|manifest| {
        let path = checkout.join(manifest);
        let content = fs::read_to_string(&path).ok()?;
        match LakefileKind::of(&path)? {
            LakefileKind::Toml => self::toml::package_name(&content),
            LakefileKind::Lean => self::lean::package_name(&content),
        }
    })
}

/// Write the root lakefile requiring every local checkout.
///
/// An existing root lakefile's `name` and `version` are kept; everything
/// else is regenerated. Checkouts whose package name cannot be read are
/// required under their directory name.
pub fn write_root_lakefile(workspace: &Path, local: &LocalCheckouts) -> Result<RootLakefile> {
    let path = workspace.join(ROOT_LAKEFILE);
    let mut name = ROOT_PACKAGE_NAME.to_string();
    let mut version = ROOT_PACKAGE_VERSION.to_string();

    if path.is_file() {
        let existing = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| self::toml::package_identity(&content).map_err(|e| e.to_string()));
        match existing {
            Ok((existing_name, existing_version)) => {
                name = existing_name.unwrap_or(name);
                version = existing_version.unwrap_or(version);
            }
            Err(e) => warn!("could not read existing {}: {}", path.display(), e),
        }
    }

    let requires: Vec<(String, String)> = local
        .iter()
        .map(|dir| {
            let package = package_name_of(&workspace.join(dir)).unwrap_or_else(|| {
                debug!("no package name for {}, using the directory name", dir);
                dir.to_string()
            });
            (package, format!("./{}", dir))
        })
        .collect();

    let content = self::toml::render_root(&name, &version, &requires);
    fs::write(&path, content).map_err(|e| Error::filesystem(&path, e))?;

    Ok(RootLakefile { path, requires })
}

/// Run `lake update` in `dir`.
pub fn lake_update(dir: &Path) -> Result<()> {
    debug!("lake update in {}", dir.display());
    let output = Command::new("lake")
        .arg("update")
        .current_dir(dir)
        .output()
        .map_err(|e| Error::Lakefile {
            path: dir.to_path_buf(),
            message: format!("could not run lake: {}", e),
        })?;

    if !output.status.success() {
        return Err(Error::Lakefile {
            path: dir.to_path_buf(),
            message: format!(
                "lake update failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RepositoryEntry;
    use tempfile::TempDir;

    fn registry() -> Registry {
        Registry::from_entries(vec![
            RepositoryEntry::new("batteries", "leanprover-community", "batteries"),
            RepositoryEntry::new("aesop", "leanprover-community", "aesop"),
            RepositoryEntry::new("Qq", "leanprover-community", "quote4"),
        ])
        .unwrap()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const AESOP_TOML: &str = r#"name = "aesop"

[[require]]
name = "batteries"
git = "https://github.com/leanprover-community/batteries"
rev = "main"
"#;

    const BATTERIES_LEAN: &str = r#"import Lake
open Lake DSL

package batteries where

require "leanprover-community" / "aesop" @ git "master"
require "leanprover-community" / "Qq" @ git "master"
"#;

    #[test]
    fn test_workspace_prefix() {
        assert_eq!(workspace_prefix(Path::new("lakefile.toml")), "../");
        assert_eq!(workspace_prefix(Path::new("sub/lakefile.lean")), "../../");
        assert_eq!(workspace_prefix(Path::new("a/b/lakefile.toml")), "../../../");
    }

    #[test]
    fn test_lakefile_kind() {
        assert_eq!(LakefileKind::of(Path::new("x/lakefile.toml")), Some(LakefileKind::Toml));
        assert_eq!(LakefileKind::of(Path::new("lakefile.lean")), Some(LakefileKind::Lean));
        assert_eq!(LakefileKind::of(Path::new("README.md")), None);
    }

    #[test]
    fn test_scan_only_registry_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("aesop")).unwrap();
        fs::create_dir(temp.path().join("unrelated")).unwrap();
        fs::write(temp.path().join("batteries"), "a file, not a checkout").unwrap();

        let local = LocalCheckouts::scan(temp.path(), &registry());
        assert_eq!(local.iter().collect::<Vec<_>>(), vec!["aesop"]);
    }

    #[test]
    fn test_rewrite_mutual_dependencies() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "aesop/lakefile.toml", AESOP_TOML);
        write(temp.path(), "batteries/lakefile.lean", BATTERIES_LEAN);

        let report = rewrite_workspace(temp.path(), &registry());
        assert!(!report.has_failures());
        assert_eq!(report.modified().count(), 2);

        let aesop = fs::read_to_string(temp.path().join("aesop/lakefile.toml")).unwrap();
        assert!(aesop.contains("path = \"../batteries\""));
        assert!(!aesop.contains("git ="));

        let batteries = fs::read_to_string(temp.path().join("batteries/lakefile.lean")).unwrap();
        assert!(batteries.contains("require aesop from \"../aesop\""));
        // Qq is not checked out, so it still resolves remotely
        assert!(batteries.contains(r#"require "leanprover-community" / "Qq" @ git "master""#));

        let root = report.root.unwrap();
        assert_eq!(
            root.requires,
            vec![
                ("aesop".to_string(), "./aesop".to_string()),
                ("batteries".to_string(), "./batteries".to_string()),
            ]
        );
    }

    #[test]
    fn test_rewrite_twice_is_noop() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "aesop/lakefile.toml", AESOP_TOML);
        write(temp.path(), "batteries/lakefile.lean", BATTERIES_LEAN);

        rewrite_workspace(temp.path(), &registry());
        let aesop = fs::read_to_string(temp.path().join("aesop/lakefile.toml")).unwrap();
        let batteries = fs::read_to_string(temp.path().join("batteries/lakefile.lean")).unwrap();
        let root = fs::read_to_string(temp.path().join("lakefile.toml")).unwrap();

        let second = rewrite_workspace(temp.path(), &registry());
        assert_eq!(second.modified().count(), 0);
        assert_eq!(
            fs::read_to_string(temp.path().join("aesop/lakefile.toml")).unwrap(),
            aesop
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("batteries/lakefile.lean")).unwrap(),
            batteries
        );
        assert_eq!(fs::read_to_string(temp.path().join("lakefile.toml")).unwrap(), root);
    }

    #[test]
    fn test_dependency_not_checked_out_is_untouched() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "aesop/lakefile.toml", AESOP_TOML);

        let report = rewrite_workspace(temp.path(), &registry());
        assert_eq!(report.modified().count(), 0);
        assert_eq!(
            fs::read_to_string(temp.path().join("aesop/lakefile.toml")).unwrap(),
            AESOP_TOML
        );
    }

    #[test]
    fn test_checkout_without_lakefile_still_in_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("Qq")).unwrap();

        let report = rewrite_workspace(temp.path(), &registry());
        assert!(report.manifests.is_empty());
        assert!(!report.has_failures());
        assert_eq!(
            report.root.unwrap().requires,
            vec![("Qq".to_string(), "./Qq".to_string())]
        );
    }

    #[test]
    fn test_manifest_without_dependencies_is_unchanged_and_in_root() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "aesop/lakefile.toml", "name = \"aesop\"\n");

        let report = rewrite_workspace(temp.path(), &registry());
        assert!(matches!(report.manifests[0].status, ManifestStatus::Unchanged));
        assert_eq!(report.root.unwrap().requires[0].0, "aesop");
    }

    #[test]
    fn test_malformed_manifest_is_reported_and_others_processed() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "aesop/lakefile.toml", "name = [unclosed");
        write(temp.path(), "batteries/lakefile.lean", BATTERIES_LEAN);

        let report = rewrite_workspace(temp.path(), &registry());
        assert!(report.has_failures());
        let failed: Vec<_> = report.failures().map(|m| m.repository.as_str()).collect();
        assert_eq!(failed, vec!["aesop"]);
        assert_eq!(report.modified_repositories(), vec!["batteries"]);
        assert!(report.root.is_ok());
    }

    #[test]
    fn test_both_manifest_kinds_processed() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "aesop/lakefile.toml", AESOP_TOML);
        write(
            temp.path(),
            "aesop/lakefile.lean",
            "package aesop\nrequire batteries from git \"https://x/batteries\"\n",
        );
        fs::create_dir(temp.path().join("batteries")).unwrap();

        let report = rewrite_workspace(temp.path(), &registry());
        assert_eq!(report.modified().count(), 2);
        assert_eq!(report.modified_repositories(), vec!["aesop"]);
    }

    #[test]
    fn test_root_lakefile_keeps_existing_identity() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "lakefile.toml",
            "name = \"my-workspace\"\nversion = \"9.9.9\"\n",
        );
        fs::create_dir(temp.path().join("aesop")).unwrap();

        rewrite_workspace(temp.path(), &registry());
        let root = fs::read_to_string(temp.path().join("lakefile.toml")).unwrap();
        assert!(root.contains("name = \"my-workspace\""));
        assert!(root.contains("version = \"9.9.9\""));
        assert!(root.contains("path = \"./aesop\""));
    }

    #[test]
    fn test_root_lakefile_uses_declared_package_name() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Qq/lakefile.lean", "package Qq where\n");
        write(temp.path(), "batteries/lakefile.toml", "name = \"Batteries\"\n");

        let root = write_root_lakefile(
            temp.path(),
            &LocalCheckouts::scan(temp.path(), &registry()),
        )
        .unwrap();
        assert_eq!(
            root.requires,
            vec![
                ("Qq".to_string(), "./Qq".to_string()),
                ("Batteries".to_string(), "./batteries".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_workspace_writes_empty_root() {
        let temp = TempDir::new().unwrap();
        let report = rewrite_workspace(temp.path(), &registry());
        assert!(report.local.is_empty());
        assert!(report.root.unwrap().requires.is_empty());
        assert!(temp.path().join("lakefile.toml").exists());
    }
}
