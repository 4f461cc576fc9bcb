//! `lakefile.toml` handling.
//!
//! Dependencies are `[[require]]` tables:
//!
//! ```toml
//! [[require]]
//! name = "batteries"
//! git = "https://github.com/leanprover-community/batteries"
//! rev = "main"
//! ```
//!
//! A require whose `name` is checked out locally is reduced to
//! `name` + `path`, dropping every remote-fetch key. The document is
//! re-serialized with `toml` (key order preserved) and tidied with `taplo`.

use log::debug;
use toml::{Table, Value};

use super::LocalCheckouts;

/// Keys that make lake fetch a dependency remotely.
const REMOTE_KEYS: &[&str] = &["git", "url", "rev", "version", "scope", "source"];

/// Parse failures carry the parser's message.
pub type ParseError = toml::de::Error;

/// Rewrite the requires of a `lakefile.toml`.
///
/// `prefix` is the relative path from the lakefile's directory back to the
/// workspace root (`"../"` for a lakefile at the top of a checkout).
/// Returns `Ok(None)` when nothing needed to change.
pub fn rewrite(
    content: &str,
    local: &LocalCheckouts,
    prefix: &str,
) -> Result<Option<String>, ParseError> {
    let mut doc: Table = content.parse()?;

    let mut modified = false;
    if let Some(Value::Array(requires)) = doc.get_mut("require") {
        for require in requires.iter_mut() {
            if let Value::Table(table) = require {
                modified |= rewrite_require(table, local, prefix);
            }
        }
    }

    if !modified {
        return Ok(None);
    }
    Ok(Some(serialize(&doc)))
}

fn rewrite_require(table: &mut Table, local: &LocalCheckouts, prefix: &str) -> bool {
    let Some(name) = table.get("name").and_then(Value::as_str).map(str::to_string) else {
        return false;
    };
    if !local.contains(&name) {
        return false;
    }

    let local_root = format!("{}{}", prefix, name);
    let has_remote = REMOTE_KEYS.iter().any(|k| table.contains_key(*k));
    let current_path = table.get("path").and_then(Value::as_str);

    // A path into the sibling checkout (possibly a sub-directory of it) is
    // already local.
    if !has_remote {
        if let Some(path) = current_path {
            if path == local_root || path.starts_with(&format!("{}/", local_root)) {
                return false;
            }
        }
    }

    let sub_dir = table
        .remove("subDir")
        .and_then(|v| v.as_str().map(|s| s.trim_matches('/').to_string()))
        .filter(|s| !s.is_empty());
    for key in REMOTE_KEYS {
        table.remove(*key);
    }

    let path = match sub_dir {
        Some(sub) => format!("{}/{}", local_root, sub),
        None => local_root,
    };
    debug!("require {} -> path {}", name, path);
    table.insert("path".to_string(), Value::String(path));
    true
}

/// Read the package name from a `lakefile.toml`.
pub fn package_name(content: &str) -> Option<String> {
    let doc: Table = content.parse().ok()?;
    doc.get("name").and_then(Value::as_str).map(str::to_string)
}

/// Existing `name`/`version` of a root lakefile, if readable.
pub fn package_identity(content: &str) -> Result<(Option<String>, Option<String>), ParseError> {
    let doc: Table = content.parse()?;
    let field = |key: &str| doc.get(key).and_then(Value::as_str).map(str::to_string);
    Ok((field("name"), field("version")))
}

/// Render a root aggregator lakefile requiring each `(package, path)`.
pub fn render_root(name: &str, version: &str, requires: &[(String, String)]) -> String {
    let mut doc = Table::new();
    doc.insert("name".to_string(), Value::String(name.to_string()));
    doc.insert("version".to_string(), Value::String(version.to_string()));

    let requires = requires
        .iter()
        .map(|(package, path)| {
            let mut table = Table::new();
            table.insert("name".to_string(), Value::String(package.clone()));
            table.insert("path".to_string(), Value::String(path.clone()));
            Value::Table(table)
        })
        .collect();
    doc.insert("require".to_string(), Value::Array(requires));

    serialize(&doc)
}

fn serialize(doc: &Table) -> String {
    // A `Table` of plain values always serializes.
    let raw = toml::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string());
    taplo::formatter::format(&raw, taplo::formatter::Options::default())
}
