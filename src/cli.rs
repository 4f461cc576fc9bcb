//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crucible::defaults::{self, DEFAULT_GIT_BASE_URL, GIT_BASE_URL_ENV, WORKSPACE_ENV};
use crucible::output::{ColorChoice, OutputConfig};

use crate::commands::{self, Context};

/// Crucible - Check out and wire up a multi-repository Lean 4 workspace
#[derive(Parser, Debug)]
#[command(name = "crucible")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Workspace root holding the checkouts (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", env = WORKSPACE_ENV)]
    workspace: Option<PathBuf>,

    /// Base URL repositories are fetched from, as <BASE>/<org>/<repo>
    #[arg(
        long,
        global = true,
        value_name = "URL",
        env = GIT_BASE_URL_ENV,
        default_value = DEFAULT_GIT_BASE_URL
    )]
    git_base_url: String,

    /// Colorize output
    #[arg(
        long,
        global = true,
        value_name = "WHEN",
        value_enum,
        default_value_t = ColorChoice::Auto
    )]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check out every repository at its pinned or default-branch commit
    Checkout(commands::checkout::CheckoutArgs),

    /// Remove checkouts, checkout.yaml and generated root files
    Clean(commands::clean::CleanArgs),

    /// Point lakefiles at local checkouts and write the root lakefile
    Lakefile(commands::lakefile::LakefileArgs),

    /// Run the built-in offline self-test scenarios
    SelfTest(commands::self_test::SelfTestArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let ctx = Context {
            workspace: self
                .workspace
                .unwrap_or_else(defaults::default_workspace_root),
            git_base_url: self.git_base_url,
            output: OutputConfig::new(self.color),
        };

        match self.command {
            Commands::Checkout(args) => commands::checkout::execute(args, &ctx),
            Commands::Clean(args) => commands::clean::execute(args, &ctx),
            Commands::Lakefile(args) => commands::lakefile::execute(args, &ctx),
            Commands::SelfTest(args) => commands::self_test::execute(args, &ctx),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // Only fails if a logger is already installed.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
