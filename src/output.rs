//! Terminal markers for command output.
//!
//! Every line a command prints about one item starts with a [`Marker`]. With
//! color enabled the marker is an emoji; otherwise it is a bracketed tag such
//! as `[OK]`, which is what scripts and the tests match on.
//!
//! In `auto` mode color follows the usual conventions: `NO_COLOR` (any
//! value) and `CLICOLOR=0` turn it off, `CLICOLOR_FORCE` turns it on even
//! when stdout is not a terminal, and `TERM=dumb` turns it off.

use std::env;

use clap::ValueEnum;

/// Value of the global `--color` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// What an output line is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Ok,
    Fail,
    Skip,
    Warn,
    DryRun,
    Checkout,
    Clean,
    Lakefile,
}

impl Marker {
    fn emoji(self) -> &'static str {
        match self {
            Marker::Ok => "✅",
            Marker::Fail => "❌",
            Marker::Skip => "⏭️",
            Marker::Warn => "⚠️",
            Marker::DryRun => "🔎",
            Marker::Checkout => "📦",
            Marker::Clean => "🧹",
            Marker::Lakefile => "🔗",
        }
    }

    fn plain(self) -> &'static str {
        match self {
            Marker::Ok => "[OK]",
            Marker::Fail => "[FAIL]",
            Marker::Skip => "[SKIP]",
            Marker::Warn => "[WARN]",
            Marker::DryRun => "[DRY RUN]",
            Marker::Checkout => "[CHECKOUT]",
            Marker::Clean => "[CLEAN]",
            Marker::Lakefile => "[LAKEFILE]",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(choice: ColorChoice) -> Self {
        let use_color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => color_from_env(|key| env::var(key).ok()),
        };
        Self { use_color }
    }

    /// Render `marker` for this configuration.
    pub fn marker(&self, marker: Marker) -> &'static str {
        if self.use_color {
            marker.emoji()
        } else {
            marker.plain()
        }
    }
}

fn color_from_env(var: impl Fn(&str) -> Option<String>) -> bool {
    if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    if var("TERM").as_deref() == Some("dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}
