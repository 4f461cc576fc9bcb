//! # Workspace Cleaning
//!
//! Removes everything crucible creates at the workspace root and nothing
//! else: the `checkout.yaml` manifest, the generated root lake files, the
//! directories named after registry entries, and staging directories left by
//! an interrupted checkout. Directories whose name is not in the registry are
//! never touched.
//!
//! Cleaning is idempotent. Missing items are reported as such, never as
//! errors, so a half-finished checkout or an already clean workspace cleans
//! up without complaint.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::defaults::{CHECKOUT_MANIFEST, GENERATED_ROOT_FILES, STAGING_PREFIX};
use crate::error::Error;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Report what would be removed without removing it.
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum CleanStatus {
    Removed,
    /// Present and would be removed (dry run).
    WouldRemove,
    Missing,
    Failed(Error),
}

#[derive(Debug)]
pub struct CleanItem {
    pub path: PathBuf,
    pub is_dir: bool,
    pub status: CleanStatus,
}

#[derive(Debug, Default)]
pub struct CleanReport {
    pub items: Vec<CleanItem>,
}

impl CleanReport {
    pub fn removed(&self) -> impl Iterator<Item = &CleanItem> {
        self.items
            .iter()
            .filter(|i| matches!(i.status, CleanStatus::Removed | CleanStatus::WouldRemove))
    }

    pub fn failures(&self) -> impl Iterator<Item = &CleanItem> {
        self.items
            .iter()
            .filter(|i| matches!(i.status, CleanStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// The root files `clean` owns, manifest first.
pub fn owned_root_files() -> Vec<&'static str> {
    std::iter::once(CHECKOUT_MANIFEST)
        .chain(GENERATED_ROOT_FILES.iter().copied())
        .collect()
}

/// Staging directories at the workspace root, sorted by name.
fn staging_dirs(workspace: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(workspace) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Remove the manifest, generated root files, registry directories and
/// leftover staging directories.
pub fn clean(workspace: &Path, registry: &Registry, options: CleanOptions) -> CleanReport {
    let mut report = CleanReport::default();

    for file in owned_root_files() {
        let path = workspace.join(file);
        let status = remove_if(&path, options, |meta| !meta.is_dir(), remove_file);
        report.items.push(CleanItem {
            path,
            is_dir: false,
            status,
        });
    }

    for entry in registry.all() {
        let path = workspace.join(&entry.name);
        // A symlink to a directory is removed as a link, never followed.
        let status = remove_if(&path, options, |_| path.is_dir(), remove_dir);
        report.items.push(CleanItem {
            path,
            is_dir: true,
            status,
        });
    }

    match staging_dirs(workspace) {
        Ok(dirs) => {
            for path in dirs {
                let status = remove_if(&path, options, |meta| meta.is_dir(), remove_dir);
                report.items.push(CleanItem {
                    path,
                    is_dir: true,
                    status,
                });
            }
        }
        Err(e) => report.items.push(CleanItem {
            path: workspace.to_path_buf(),
            is_dir: true,
            status: CleanStatus::Failed(Error::filesystem(workspace, e)),
        }),
    }

    report
}

fn remove_file(path: &Path, _meta: &fs::Metadata) -> io::Result<()> {
    fs::remove_file(path)
}

fn remove_dir(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.file_type().is_symlink() {
        fs::remove_file(path)
    } else {
        fs::remove_dir_all(path)
    }
}

fn remove_if(
    path: &Path,
    options: CleanOptions,
    applies: impl Fn(&fs::Metadata) -> bool,
    remove: impl Fn(&Path, &fs::Metadata) -> io::Result<()>,
) -> CleanStatus {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return CleanStatus::Missing,
        Err(e) => return CleanStatus::Failed(Error::filesystem(path, e)),
    };

    if !applies(&meta) {
        debug!("leaving {}: not the kind of entry crucible owns", path.display());
        return CleanStatus::Missing;
    }

    if options.dry_run {
        return CleanStatus::WouldRemove;
    }

    match remove(path, &meta) {
        Ok(()) => CleanStatus::Removed,
        Err(e) => CleanStatus::Failed(Error::filesystem(path, e)),
    }
}
