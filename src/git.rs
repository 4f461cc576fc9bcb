//! Thin wrappers around the system `git` command.
//!
//! Using the system binary means crucible picks up whatever authentication
//! the user already has configured:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use log::debug;
use url::Url;

use crate::error::{Error, Result};

/// The default branch of a remote and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHead {
    pub sha: String,
    pub branch: String,
}

/// Whether `sha` looks like a full or abbreviated commit id (4 to 40 hex
/// digits). Anything else must never reach a `git` command line.
pub fn is_commit_sha(sha: &str) -> bool {
    (4..=40).contains(&sha.len()) && sha.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Form the remote URL for `<org>/<repo>` under a hosting base URL.
///
/// The base may carry a path (`file:///srv/mirrors`), which is kept.
pub fn repository_url(base_url: &str, org: &str, repo: &str) -> Result<String> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(&format!("{}/{}", org, repo))?.to_string())
}

fn git(args: &[&str], cwd: Option<&Path>) -> std::io::Result<Output> {
    debug!("git {}", args.join(" "));
    let mut cmd = Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.output()
}

fn run_git(args: &[&str], cwd: Option<&Path>, url: &str) -> Result<String> {
    let output = git(args, cwd).map_err(|e| Error::GitCommand {
        command: args.join(" "),
        url: url.to_string(),
        stderr: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            url: url.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Query the remote's default branch and its head commit.
pub fn default_branch_head(url: &str) -> Result<RemoteHead> {
    let stdout = run_git(&["ls-remote", "--symref", url, "HEAD"], None, url).map_err(|e| {
        match e {
            Error::GitCommand { stderr, .. } => Error::Network {
                url: url.to_string(),
                message: stderr,
            },
            other => other,
        }
    })?;

    parse_symref_head(&stdout).ok_or_else(|| Error::Network {
        url: url.to_string(),
        message: "remote did not advertise a default branch".to_string(),
    })
}

/// Parse `git ls-remote --symref <url> HEAD` output.
///
/// ```text
/// ref: refs/heads/main	HEAD
/// 1a2b3c...	HEAD
/// ```
pub fn parse_symref_head(stdout: &str) -> Option<RemoteHead> {
    let mut branch = None;
    let mut sha = None;

    for line in stdout.lines() {
        let mut parts = line.split('\t');
        let (Some(left), Some("HEAD")) = (parts.next(), parts.next()) else {
            continue;
        };
        if let Some(target) = left.strip_prefix("ref: ") {
            branch = Some(target.strip_prefix("refs/heads/").unwrap_or(target).to_string());
        } else if !left.is_empty() {
            sha = Some(left.trim().to_string());
        }
    }

    Some(RemoteHead {
        sha: sha?,
        branch: branch?,
    })
}

/// Fetch `url` at commit `sha` into `target_dir` as a plain tree without
/// history.
///
/// `target_dir` must not exist yet. A shallow fetch of the exact commit is
/// tried first; servers that refuse to serve bare SHAs get a full fetch.
/// On error, `target_dir` may be left partially populated and the caller is
/// expected to discard it.
pub fn fetch_commit(url: &str, sha: &str, target_dir: &Path) -> Result<()> {
    if !is_commit_sha(sha) {
        return Err(Error::Validation {
            message: format!("'{}' is not a commit sha", sha),
            hint: Some("expected 4 to 40 hexadecimal digits".to_string()),
        });
    }
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let target = target_dir.to_string_lossy();
    run_git(&["init", "--quiet", &target], None, url)?;

    let shallow = run_git(
        &["fetch", "--quiet", "--depth=1", "--end-of-options", url, sha],
        Some(target_dir),
        url,
    );
    if let Err(e) = shallow {
        debug!("shallow fetch of {} failed, fetching all refs: {}", sha, e);
        run_git(
            &[
                "fetch",
                "--quiet",
                "--end-of-options",
                url,
                "+refs/heads/*:refs/remotes/origin/*",
                "+refs/tags/*:refs/tags/*",
            ],
            Some(target_dir),
            url,
        )?;
    }

    let commit = format!("{}^{{commit}}", sha);
    run_git(
        &[
            "-c",
            "advice.detachedHead=false",
            "checkout",
            "--quiet",
            "--detach",
            "--end-of-options",
            &commit,
        ],
        Some(target_dir),
        url,
    )?;

    fs::remove_dir_all(target_dir.join(".git"))?;
    Ok(())
}
