//! `lakefile.lean` handling.
//!
//! Lean lakefiles are programs, so they are edited textually: only `require`
//! statements naming a local checkout are replaced, in any of these forms:
//!
//! ```lean
//! require batteries
//! require batteries from git "https://github.com/leanprover-community/batteries" @ "main"
//! require proofwidgets from git "https://github.com/leanprover-community/ProofWidgets4" @ "v0.0.40" / "lean"
//! require "leanprover-community" / "batteries" @ git "main"
//! require "leanprover-community" / "batteries" @ "v4.12.0"
//! require «batteries» from "../somewhere"
//! ```
//!
//! Each becomes `require batteries from "../batteries"`, with a git
//! sub-directory appended to the path. Any trailing `with ...` options clause
//! is left in place. Only statements at the start of a line are considered,
//! so commented-out requires stay as written.

use log::debug;
use regex::{Captures, Regex};

use super::LocalCheckouts;
use crate::error::Result;

const REQUIRE_PATTERN: &str = concat!(
    r#"(?m)^(?P<indent>[ \t]*)require\s+"#,
    r#"(?:"[^"]*"\s*/\s*"(?P<scoped>[^"]+)"|«(?P<quoted>[^»]+)»|(?P<ident>[A-Za-z_][A-Za-z0-9_'!?]*))"#,
    r#"(?P<source>"#,
    r#"\s+@\s+git\s+"[^"]*""#,
    r#"|\s+@\s+"[^"]*""#,
    r#"|\s+from\s+git\s+"[^"]*"(?:\s+@\s+"[^"]*")?(?:\s*/\s*"(?P<sub>[^"]*)")?"#,
    r#"|\s+from\s+"(?P<path>[^"]*)""#,
    r#")?"#,
);

const PACKAGE_PATTERN: &str =
    r"(?m)^\s*package\s+(?:«(?P<quoted>[^»]+)»|(?P<ident>[A-Za-z_][A-Za-z0-9_'!?]*))";

fn required_name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.name("scoped")
        .or_else(|| caps.name("quoted"))
        .or_else(|| caps.name("ident"))
        .map(|m| m.as_str())
}

fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Rewrite the `require` statements of a `lakefile.lean`.
///
/// `prefix` is the relative path from the lakefile's directory back to the
/// workspace root. Returns `Ok(None)` when nothing needed to change.
pub fn rewrite(content: &str, local: &LocalCheckouts, prefix: &str) -> Result<Option<String>> {
    let require = Regex::new(REQUIRE_PATTERN)?;
    let rewritten = require.replace_all(content, |caps: &Captures| {
        let original = caps[0].to_string();
        let Some(name) = required_name(caps) else {
            return original;
        };
        if !local.contains(name) {
            return original;
        }

        let local_root = format!("{}{}", prefix, name);
        let target = match caps.name("sub").map(|m| m.as_str().trim_matches('/')) {
            Some(sub) if !sub.is_empty() => format!("{}/{}", local_root, sub),
            _ => local_root.clone(),
        };
        if let Some(path) = caps.name("path").map(|m| m.as_str()) {
            if path == local_root || path.starts_with(&format!("{}/", local_root)) {
                return original;
            }
        }

        let rendered = if is_plain_ident(name) {
            name.to_string()
        } else {
            format!("«{}»", name)
        };
        let indent = caps.name("indent").map_or("", |m| m.as_str());
        debug!("require {} -> path {}", name, target);
        format!("{}require {} from \"{}\"", indent, rendered, target)
    });

    if rewritten == content {
        Ok(None)
    } else {
        Ok(Some(rewritten.into_owned()))
    }
}

/// Read the package name from `package <name>` in a `lakefile.lean`.
pub fn package_name(content: &str) -> Option<String> {
    let caps = Regex::new(PACKAGE_PATTERN).ok()?.captures(content)?;
    caps.name("quoted")
        .or_else(|| caps.name("ident"))
        .map(|m| m.as_str().to_string())
}
