//! # Crucible
//!
//! Crucible reproduces a multi-repository Lean 4 build graph on a developer
//! workstation. It checks out a fixed set of interdependent repositories at
//! pinned commits, rewrites their lakefiles so they depend on each other
//! through relative paths instead of remote revisions, and cleans the
//! workspace up again afterwards.
//!
//! ## Quick Example
//!
//! ```
//! use crucible::lakefile::{toml, LocalCheckouts};
//!
//! let lakefile = r#"
//! name = "aesop"
//!
//! [[require]]
//! name = "batteries"
//! git = "https://github.com/leanprover-community/batteries"
//! rev = "main"
//! "#;
//!
//! let local = LocalCheckouts::new(["batteries".to_string()]);
//! let rewritten = toml::rewrite(lakefile, &local, "../").unwrap().unwrap();
//! assert!(rewritten.contains("path = \"../batteries\""));
//! assert!(!rewritten.contains("git ="));
//! ```
//!
//! ## Core Concepts
//!
//! - **Registry (`registry`)**: the compiled-in allow-list of repositories.
//!   Every repository name the tool acts on must be registered.
//! - **Checkout (`checkout`, `repository`, `git`)**: resolves which commit of
//!   each repository to use, from a file, a stream or the remotes' default
//!   branches, and materializes the trees into `<workspace>/<name>/`.
//! - **Lakefile rewriting (`lakefile`)**: points dependencies between local
//!   checkouts at each other and synthesizes a root lakefile requiring all
//!   of them.
//! - **Cleaning (`clean`)**: removes exactly what crucible created.
//!
//! All state between invocations lives in the workspace directory: the
//! `checkout.yaml` manifest and the checkout directories themselves.

pub mod checkout;
pub mod clean;
pub mod defaults;
pub mod error;
pub mod git;
pub mod lakefile;
pub mod output;
pub mod registry;
pub mod repository;
pub mod selftest;

#[cfg(test)]
mod lakefile_proptest;
