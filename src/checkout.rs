//! # Checkout Resolution and Materialization
//!
//! A checkout run has two halves:
//!
//! 1. **Resolution** turns one input source into a [`ResolvedCheckout`], the
//!    mapping from registry name to the commit that should be on disk. The
//!    source is exactly one of an explicit YAML file, a YAML stream (stdin),
//!    or the current default-branch heads queried from the hosting service.
//! 2. **Materialization** writes each entry's tree into `<workspace>/<name>/`,
//!    replacing whatever was there.
//!
//! Entries are processed one at a time. Failures are recorded per entry in a
//! [`CheckoutReport`]; entries that succeeded stay on disk even when others
//! fail. A failed entry never leaves a directory behind: trees are fetched
//! into a staging directory and only moved into place once complete.
//!
//! ## Manifest format
//!
//! Both the input and the `checkout.yaml` written afterwards use the same
//! YAML shape:
//!
//! ```yaml
//! batteries:
//!   github_org: leanprover-community
//!   github_repo: batteries
//!   sha: 0f3e143dffdc3a591662f3401ce1d7a3405227c0
//!   branch: main
//! ```
//!
//! On input, `github_org` and `github_repo` may be omitted and default to the
//! registry entry.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults::{CHECKOUT_MANIFEST, STAGING_PREFIX};
use crate::error::{Error, Result};
use crate::git::{is_commit_sha, repository_url};
use crate::registry::Registry;
use crate::repository::GitOperations;

/// Where one repository should be checked out from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEntry {
    pub github_org: String,
    pub github_repo: String,
    pub sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Mapping from registry name to the commit to materialize.
///
/// Every key is a registry name; values built through [`ResolvedCheckout::parse`]
/// or [`resolve_defaults`] are validated against the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedCheckout {
    entries: BTreeMap<String, CheckoutEntry>,
}

#[derive(Debug, Deserialize)]
struct InputEntry {
    github_org: Option<String>,
    github_repo: Option<String>,
    #[serde(deserialize_with = "sha_from_scalar")]
    sha: String,
    branch: Option<String>,
}

// All-digit SHAs arrive from YAML as integers.
fn sha_from_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a commit SHA, found {:?}",
            other
        ))),
    }
}

impl ResolvedCheckout {
    /// Parse and validate checkout input.
    ///
    /// `source_name` only labels error messages (a path or `<stdin>`).
    pub fn parse(content: &str, source_name: &str, registry: &Registry) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(Error::Validation {
                message: format!("no YAML provided in {}", source_name),
                hint: Some("expected a mapping of repository name to {sha: ...}".to_string()),
            });
        }

        let raw: Option<BTreeMap<String, InputEntry>> =
            serde_yaml::from_str(content).map_err(|e| Error::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        let raw = raw.unwrap_or_default();
        if raw.is_empty() {
            return Err(Error::Validation {
                message: format!("{} does not name any repositories", source_name),
                hint: None,
            });
        }

        let mut entries = BTreeMap::new();
        for (name, input) in raw {
            let known = registry.require(&name)?;
            let sha = input.sha.trim().to_string();
            if sha.is_empty() {
                return Err(Error::Validation {
                    message: format!("repository '{}' has an empty sha", name),
                    hint: None,
                });
            }
            if !is_commit_sha(&sha) {
                return Err(Error::Validation {
                    message: format!("repository '{}' has an invalid sha '{}'", name, sha),
                    hint: Some("expected a commit id of 4 to 40 hexadecimal digits".to_string()),
                });
            }
            entries.insert(
                name,
                CheckoutEntry {
                    github_org: input
                        .github_org
                        .unwrap_or_else(|| known.upstream_org.clone()),
                    github_repo: input
                        .github_repo
                        .unwrap_or_else(|| known.upstream_name.clone()),
                    sha,
                    branch: input.branch,
                },
            );
        }

        Ok(Self { entries })
    }

    /// Resolve from an explicit YAML file.
    pub fn from_file(path: &Path, registry: &Registry) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        Self::parse(&content, &path.display().to_string(), registry)
    }

    /// Resolve from an in-process byte stream, typically stdin.
    pub fn from_reader(mut reader: impl Read, registry: &Registry) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content, "<stdin>", registry)
    }

    /// Read a previously written `checkout.yaml` from the workspace.
    ///
    /// Returns `Ok(None)` when the workspace has no manifest. The contents are
    /// not validated against the registry; stale names are simply ignored by
    /// callers.
    pub fn load_manifest(workspace: &Path) -> Result<Option<Self>> {
        let path = manifest_path(workspace);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::filesystem(&path, e))?;
        let manifest = serde_yaml::from_str(&content).map_err(|e| Error::Parse {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(manifest))
    }

    /// Write this checkout as the workspace's `checkout.yaml`.
    pub fn write_manifest(&self, workspace: &Path) -> Result<PathBuf> {
        let path = manifest_path(workspace);
        fs::write(&path, self.to_yaml()?).map_err(|e| Error::filesystem(&path, e))?;
        Ok(path)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn get(&self, name: &str) -> Option<&CheckoutEntry> {
        self.entries.get(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckoutEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: String, entry: CheckoutEntry) {
        self.entries.insert(name, entry);
    }
}

/// Path of the resolved-manifest file inside a workspace.
pub fn manifest_path(workspace: &Path) -> PathBuf {
    workspace.join(CHECKOUT_MANIFEST)
}

/// One entry that could not be resolved or checked out.
#[derive(Debug)]
pub struct EntryFailure {
    pub name: String,
    pub error: Error,
}

/// Result of querying default branches for the whole registry.
#[derive(Debug, Default)]
pub struct DefaultsResolution {
    pub checkout: ResolvedCheckout,
    /// Entries whose default branch could not be determined. These are not
    /// in `checkout`; the others still are.
    pub failures: Vec<EntryFailure>,
}

/// Query the head of each registry entry's default branch.
///
/// One query per entry. A failing entry is recorded and the rest are still
/// resolved.
pub fn resolve_defaults(
    registry: &Registry,
    git: &dyn GitOperations,
    base_url: &str,
) -> DefaultsResolution {
    let mut resolution = DefaultsResolution::default();

    for entry in registry.all() {
        let result = repository_url(base_url, &entry.upstream_org, &entry.upstream_name)
            .and_then(|url| git.default_branch_head(&url));

        match result {
            Ok(head) => {
                debug!("{}: default branch {} at {}", entry.name, head.branch, head.sha);
                resolution.checkout.insert(
                    entry.name.clone(),
                    CheckoutEntry {
                        github_org: entry.upstream_org.clone(),
                        github_repo: entry.upstream_name.clone(),
                        sha: head.sha,
                        branch: Some(head.branch),
                    },
                );
            }
            Err(error) => {
                warn!("could not resolve default branch of {}: {}", entry.name, error);
                resolution.failures.push(EntryFailure {
                    name: entry.name.clone(),
                    error,
                });
            }
        }
    }

    resolution
}

#[derive(Debug)]
pub enum EntryOutcome {
    /// The tree was fetched and moved into place.
    Fetched,
    /// `checkout.yaml` already recorded this commit and the directory exists.
    AlreadyPresent,
    Failed(Error),
}

#[derive(Debug)]
pub struct EntryReport {
    pub name: String,
    pub entry: CheckoutEntry,
    pub outcome: EntryOutcome,
}

impl EntryReport {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, EntryOutcome::Failed(_))
    }
}

/// Per-entry results of [`materialize`], in processing order.
#[derive(Debug, Default)]
pub struct CheckoutReport {
    pub entries: Vec<EntryReport>,
}

impl CheckoutReport {
    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| !e.succeeded())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// The entries now on disk at their resolved commit.
    pub fn present(&self) -> ResolvedCheckout {
        let mut checkout = ResolvedCheckout::default();
        for report in self.entries.iter().filter(|e| e.succeeded()) {
            checkout.insert(report.name.clone(), report.entry.clone());
        }
        checkout
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaterializeOptions {
    /// Fetch even when `checkout.yaml` says the commit is already present.
    pub force: bool,
}

/// Materialize every entry of `checkout` under `workspace`.
///
/// `on_entry` is called after each entry with its outcome, so callers can
/// report progress as it happens.
pub fn materialize(
    checkout: &ResolvedCheckout,
    workspace: &Path,
    git: &dyn GitOperations,
    base_url: &str,
    options: MaterializeOptions,
    mut on_entry: impl FnMut(&EntryReport),
) -> CheckoutReport {
    let existing = match ResolvedCheckout::load_manifest(workspace) {
        Ok(existing) => existing.unwrap_or_default(),
        Err(e) => {
            warn!("ignoring unreadable {}: {}", CHECKOUT_MANIFEST, e);
            ResolvedCheckout::default()
        }
    };

    let mut report = CheckoutReport::default();
    for (name, entry) in checkout.iter() {
        let already_present = !options.force
            && existing.get(name).is_some_and(|e| e.sha == entry.sha)
            && workspace.join(name).is_dir();

        let outcome = if already_present {
            info!("{} is already at {}, skipping", name, entry.sha);
            EntryOutcome::AlreadyPresent
        } else {
            match materialize_entry(name, entry, workspace, git, base_url) {
                Ok(()) => EntryOutcome::Fetched,
                Err(e) => EntryOutcome::Failed(e),
            }
        };

        let entry_report = EntryReport {
            name: name.to_string(),
            entry: entry.clone(),
            outcome,
        };
        on_entry(&entry_report);
        report.entries.push(entry_report);
    }

    report
}

/// Fetch one entry into `<workspace>/<name>/`, replacing any existing
/// directory only once the new tree is complete.
pub fn materialize_entry(
    name: &str,
    entry: &CheckoutEntry,
    workspace: &Path,
    git: &dyn GitOperations,
    base_url: &str,
) -> Result<()> {
    let url = repository_url(base_url, &entry.github_org, &entry.github_repo)?;
    fs::create_dir_all(workspace).map_err(|e| Error::filesystem(workspace, e))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(workspace)
        .map_err(|e| Error::filesystem(workspace, e))?;
    let staged = staging.path().join(name);

    info!("fetching {} at {} into {}", url, entry.sha, name);
    git.fetch_commit(&url, &entry.sha, &staged)
        .map_err(|e| Error::Checkout {
            name: name.to_string(),
            sha: entry.sha.clone(),
            message: e.to_string(),
            hint: Some(format!(
                "check that {} exists in {}/{} and that you have access to it",
                entry.sha, entry.github_org, entry.github_repo
            )),
        })?;

    let target = workspace.join(name);
    remove_existing(&target).map_err(|e| Error::filesystem(&target, e))?;
    fs::rename(&staged, &target).map_err(|e| Error::filesystem(&target, e))?;
    Ok(())
}

fn remove_existing(path: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
