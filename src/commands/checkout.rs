//! # Checkout Command Implementation
//!
//! Resolves which commit of each registry repository to use and
//! materializes the trees into the workspace.
//!
//! ## Sources
//!
//! - `-f/--file FILE`: a YAML mapping of repository name to `{sha, ...}`.
//! - `--stdin`: the same mapping read from standard input.
//! - neither: the head of each repository's default branch, queried from the
//!   hosting service once per registry entry.
//!
//! After the run `checkout.yaml` records the entries that are on disk at
//! their resolved commit. Entries that failed are listed in the summary and
//! make the command exit non-zero; the ones that succeeded stay in place.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crucible::checkout::{
    self, materialize, DefaultsResolution, EntryOutcome, EntryReport, MaterializeOptions,
    ResolvedCheckout,
};
use crucible::output::{Marker, OutputConfig};
use crucible::registry::Registry;
use crucible::repository::DefaultGitOperations;

use super::Context;

/// Check out the registry repositories at pinned commits
#[derive(Args, Debug)]
pub struct CheckoutArgs {
    /// Read the commits to check out from a YAML file
    #[arg(short, long, value_name = "FILE", conflicts_with = "stdin")]
    pub file: Option<PathBuf>,

    /// Read the commits to check out from standard input
    #[arg(long)]
    pub stdin: bool,

    /// Fetch entries even if checkout.yaml says they are already present
    #[arg(long)]
    pub force: bool,

    /// Print the resolved checkout as YAML and stop
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the `checkout` command.
pub fn execute(args: CheckoutArgs, ctx: &Context) -> Result<()> {
    let registry = Registry::builtin()?;
    let git = DefaultGitOperations;

    let (resolved, resolve_failures) = if let Some(path) = &args.file {
        (ResolvedCheckout::from_file(path, registry)?, Vec::new())
    } else if args.stdin {
        (ResolvedCheckout::from_reader(io::stdin().lock(), registry)?, Vec::new())
    } else {
        let DefaultsResolution {
            checkout: resolved,
            failures,
        } = checkout::resolve_defaults(registry, &git, &ctx.git_base_url);
        (resolved, failures)
    };

    for failure in &resolve_failures {
        eprintln!(
            "{} {}: {}",
            ctx.output.marker(Marker::Fail),
            failure.name,
            failure.error
        );
    }

    if args.dry_run {
        print!("{}", resolved.to_yaml()?);
        if !resolve_failures.is_empty() {
            anyhow::bail!(
                "could not resolve {} of {} repositories",
                resolve_failures.len(),
                registry.len()
            );
        }
        return Ok(());
    }

    println!(
        "{} Checking out {} repositories into {}",
        ctx.output.marker(Marker::Checkout),
        resolved.len(),
        ctx.workspace.display()
    );

    let options = MaterializeOptions { force: args.force };
    let report = materialize(
        &resolved,
        &ctx.workspace,
        &git,
        &ctx.git_base_url,
        options,
        |entry| print_entry(&ctx.output, entry),
    );

    let present = report.present();
    if !present.is_empty() {
        let path = present.write_manifest(&ctx.workspace)?;
        log::info!("wrote {}", path.display());
    }

    let fetched = report
        .entries
        .iter()
        .filter(|e| matches!(e.outcome, EntryOutcome::Fetched))
        .count();
    let skipped = report
        .entries
        .iter()
        .filter(|e| matches!(e.outcome, EntryOutcome::AlreadyPresent))
        .count();
    let failed: Vec<&str> = report
        .failures()
        .map(|e| e.name.as_str())
        .chain(resolve_failures.iter().map(|f| f.name.as_str()))
        .collect();

    println!();
    println!(
        "{} fetched, {} already present, {} failed",
        fetched,
        skipped,
        failed.len()
    );

    if !failed.is_empty() {
        anyhow::bail!("checkout failed for: {}", failed.join(", "));
    }

    Ok(())
}

fn print_entry(config: &OutputConfig, entry: &EntryReport) {
    match &entry.outcome {
        EntryOutcome::Fetched => {
            println!("{} {} at {}", config.marker(Marker::Ok), entry.name, entry.entry.sha)
        }
        EntryOutcome::AlreadyPresent => println!(
            "{} {} already at {}",
            config.marker(Marker::Skip),
            entry.name,
            entry.entry.sha
        ),
        EntryOutcome::Failed(error) => {
            eprintln!("{} {}: {}", config.marker(Marker::Fail), entry.name, error)
        }
    }
}
