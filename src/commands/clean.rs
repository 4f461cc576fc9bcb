//! # Clean Command Implementation
//!
//! Removes `checkout.yaml`, the generated root lake files, every directory
//! named after a registry entry and any leftover staging directories. Nothing else in the workspace is
//! touched, and running it on a clean workspace succeeds quietly.

use anyhow::Result;
use clap::Args;

use crucible::clean::{clean, CleanItem, CleanOptions, CleanStatus};
use crucible::output::{Marker, OutputConfig};
use crucible::registry::Registry;

use super::Context;

/// Remove everything crucible created in the workspace
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// List what would be removed without removing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the `clean` command.
pub fn execute(args: CleanArgs, ctx: &Context) -> Result<()> {
    let registry = Registry::builtin()?;

    if args.dry_run {
        println!(
            "{} DRY RUN MODE - No changes will be made",
            ctx.output.marker(Marker::DryRun)
        );
    }

    let report = clean(
        &ctx.workspace,
        registry,
        CleanOptions {
            dry_run: args.dry_run,
        },
    );

    for item in &report.items {
        print_item(&ctx.output, item);
    }

    let removed = report.removed().count();
    if removed == 0 && !report.has_failures() {
        println!(
            "{} Nothing to clean in {}",
            ctx.output.marker(Marker::Clean),
            ctx.workspace.display()
        );
    } else if args.dry_run {
        println!("{} items would be removed", removed);
    } else {
        println!(
            "{} Removed {} items",
            ctx.output.marker(Marker::Clean),
            removed
        );
    }

    let failures = report.failures().count();
    if failures > 0 {
        anyhow::bail!("could not remove {} items", failures);
    }

    Ok(())
}

fn print_item(config: &OutputConfig, item: &CleanItem) {
    let suffix = if item.is_dir { "/" } else { "" };
    match &item.status {
        CleanStatus::Removed => println!(
            "{} removed {}{}",
            config.marker(Marker::Ok),
            item.path.display(),
            suffix
        ),
        CleanStatus::WouldRemove => println!("would remove {}{}", item.path.display(), suffix),
        CleanStatus::Missing => {}
        CleanStatus::Failed(error) => eprintln!("{} {}", config.marker(Marker::Fail), error),
    }
}
