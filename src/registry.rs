//! # Repository Registry
//!
//! The fixed allow-list of repositories crucible manages. Every other
//! component validates repository names against it: a name that is not
//! registered is never checked out, never rewritten to a local path and never
//! deleted by `clean`.
//!
//! The built-in registry is compiled into the binary from
//! `src/repositories.yml`; changing it requires a new release.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

const BUILTIN_REGISTRY: &str = include_str!("repositories.yml");

/// A repository known to crucible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Local directory name, unique within the registry
    pub name: String,
    /// Upstream organization on the hosting service
    #[serde(rename = "github_org")]
    pub upstream_org: String,
    /// Upstream repository name on the hosting service
    #[serde(rename = "github_repo")]
    pub upstream_name: String,
}

impl RepositoryEntry {
    pub fn new(
        name: impl Into<String>,
        upstream_org: impl Into<String>,
        upstream_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            upstream_org: upstream_org.into(),
            upstream_name: upstream_name.into(),
        }
    }
}

/// An immutable, validated list of [`RepositoryEntry`] values.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<RepositoryEntry>,
}

impl Registry {
    /// The registry embedded in the binary, parsed once per process.
    pub fn builtin() -> Result<&'static Registry> {
        static BUILTIN: OnceLock<std::result::Result<Registry, String>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Registry::from_yaml(BUILTIN_REGISTRY).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|message| Error::Validation {
                message: format!("embedded repositories.yml is invalid: {}", message),
                hint: None,
            })
    }

    /// Parse a registry from its YAML list form.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let entries: Vec<RepositoryEntry> =
            serde_yaml::from_str(content).map_err(|e| Error::Parse {
                source_name: "repositories.yml".to_string(),
                message: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    /// Build a registry from entries, rejecting duplicate or unsafe names.
    pub fn from_entries(entries: Vec<RepositoryEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            validate_name(&entry.name)?;
            if entry.upstream_org.is_empty() || entry.upstream_name.is_empty() {
                return Err(Error::Validation {
                    message: format!("repository '{}' has an empty upstream", entry.name),
                    hint: None,
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::Validation {
                    message: format!("repository '{}' is registered twice", entry.name),
                    hint: None,
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, name: &str) -> Option<&RepositoryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Like [`Registry::lookup`] but fails with a validation error listing
    /// the known names.
    pub fn require(&self, name: &str) -> Result<&RepositoryEntry> {
        self.lookup(name).ok_or_else(|| Error::UnknownRepository {
            name: name.to_string(),
            hint: Some(format!("known repositories: {}", self.names().join(", "))),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All entries in declaration order.
    pub fn all(&self) -> &[RepositoryEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Names become directory names at the workspace root.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_whitespace);
    if bad {
        return Err(Error::Validation {
            message: format!("'{}' is not a valid repository name", name),
            hint: Some("names must be a single path component".to_string()),
        });
    }
    Ok(())
}
