//! # Lakefile Command Implementation
//!
//! Rewrites the lakefiles of every checkout present in the workspace so that
//! dependencies on other local checkouts use relative paths, then writes the
//! root `lakefile.toml` requiring all of them.
//!
//! A lakefile that cannot be parsed or written is reported and skipped; the
//! others are still processed and the command exits non-zero at the end.

use anyhow::Result;
use clap::Args;

use crucible::lakefile::{self, ManifestOutcome, ManifestStatus};
use crucible::output::{Marker, OutputConfig};
use crucible::registry::Registry;

use super::Context;

/// Point lakefiles at the local checkouts
#[derive(Args, Debug)]
pub struct LakefileArgs {
    /// Run `lake update` in each modified checkout and in the workspace root
    #[arg(long)]
    pub update: bool,
}

/// Execute the `lakefile` command.
pub fn execute(args: LakefileArgs, ctx: &Context) -> Result<()> {
    let registry = Registry::builtin()?;

    println!(
        "{} Rewriting lakefiles in {}",
        ctx.output.marker(Marker::Lakefile),
        ctx.workspace.display()
    );

    let report = lakefile::rewrite_workspace(&ctx.workspace, registry);

    if report.local.is_empty() {
        println!("No checkouts found; run `crucible checkout` first");
    }

    for manifest in &report.manifests {
        print_manifest(&ctx.output, manifest);
    }

    match &report.root {
        Ok(root) => println!(
            "{} {} requires {} checkouts",
            ctx.output.marker(Marker::Ok),
            root.path.display(),
            root.requires.len()
        ),
        Err(error) => eprintln!("{} {}", ctx.output.marker(Marker::Fail), error),
    }

    if args.update {
        for repository in report.modified_repositories() {
            run_lake_update(&ctx.output, &ctx.workspace.join(repository));
        }
        if report.root.is_ok() {
            run_lake_update(&ctx.output, &ctx.workspace);
        }
    }

    let modified = report.modified().count();
    let failed = report.failures().count();
    let unchanged = report.manifests.len() - modified - failed;
    println!();
    println!(
        "{} modified, {} unchanged, {} failed",
        modified, unchanged, failed
    );

    if report.has_failures() {
        anyhow::bail!("some lakefiles could not be rewritten");
    }

    Ok(())
}

fn print_manifest(config: &OutputConfig, manifest: &ManifestOutcome) {
    match &manifest.status {
        ManifestStatus::Modified => {
            println!("{} {}", config.marker(Marker::Ok), manifest.path.display())
        }
        ManifestStatus::Unchanged => println!(
            "{} {} (unchanged)",
            config.marker(Marker::Skip),
            manifest.path.display()
        ),
        ManifestStatus::Failed(error) => eprintln!("{} {}", config.marker(Marker::Fail), error),
    }
}

fn run_lake_update(config: &OutputConfig, dir: &std::path::Path) {
    if let Err(error) = lakefile::lake_update(dir) {
        eprintln!("{}  warning: {}", config.marker(Marker::Warn), error);
    }
}
