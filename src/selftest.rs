//! Built-in offline scenarios run by `crucible self-test`.
//!
//! Each scenario builds a scratch workspace in a temporary directory,
//! exercises one of the workspace operations against the built-in registry
//! and checks the observable result. None of them touch the network.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::clean::{clean, CleanOptions};
use crate::defaults::CHECKOUT_MANIFEST;
use crate::lakefile::{rewrite_workspace, LocalCheckouts};
use crate::registry::Registry;

type ScenarioResult = std::result::Result<(), String>;

/// A named self-test scenario.
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    run: fn(&Path, &Registry) -> ScenarioResult,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "registry",
        description: "the embedded registry is non-empty and well formed",
        run: registry_loads,
    },
    Scenario {
        name: "clean-empty",
        description: "clean succeeds on an empty workspace",
        run: clean_empty,
    },
    Scenario {
        name: "clean-preserves-foreign",
        description: "clean leaves non-registry directories byte-identical",
        run: clean_preserves_foreign,
    },
    Scenario {
        name: "rewrite-mutual",
        description: "two checkouts depending on each other are wired by relative path",
        run: rewrite_mutual,
    },
    Scenario {
        name: "rewrite-idempotent",
        description: "rewriting an already rewritten workspace changes nothing",
        run: rewrite_idempotent,
    },
    Scenario {
        name: "rewrite-foreign-untouched",
        description: "dependencies that are not checked out are never altered",
        run: rewrite_foreign_untouched,
    },
];

pub fn scenario_names() -> Vec<&'static str> {
    SCENARIOS.iter().map(|s| s.name).collect()
}

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

impl Scenario {
    /// Run the scenario in a fresh temporary workspace.
    pub fn run(&self, registry: &Registry) -> ScenarioResult {
        let scratch = tempfile::Builder::new()
            .prefix("crucible-self-test-")
            .tempdir()
            .map_err(|e| format!("could not create scratch workspace: {}", e))?;
        (self.run)(scratch.path(), registry)
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> ScenarioResult {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

fn write(root: &Path, rel: &str, content: &str) -> ScenarioResult {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(&path, content).map_err(|e| format!("{}: {}", path.display(), e))
}

fn read(path: &Path) -> std::result::Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Every file under `root` with its contents, keyed by relative path.
fn snapshot(root: &Path) -> std::result::Result<BTreeMap<PathBuf, Vec<u8>>, String> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| e.to_string())?;
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| e.to_string())?
                .to_path_buf();
            let content = fs::read(entry.path()).map_err(|e| e.to_string())?;
            files.insert(rel, content);
        }
    }
    Ok(files)
}

/// Two registry names to play the part of mutually dependent checkouts.
fn two_names(registry: &Registry) -> std::result::Result<(String, String), String> {
    match registry.names().as_slice() {
        [a, b, ..] => Ok((a.to_string(), b.to_string())),
        _ => Err("the registry needs at least two entries".to_string()),
    }
}

/// A registry name different from both of `two_names`, if there is one.
fn third_name(registry: &Registry) -> Option<String> {
    registry.names().get(2).map(|s| s.to_string())
}

fn registry_loads(_workspace: &Path, registry: &Registry) -> ScenarioResult {
    ensure(!registry.is_empty(), || "registry is empty".to_string())?;
    let names = registry.names();
    for name in &names {
        let entry = registry
            .lookup(name)
            .ok_or_else(|| format!("lookup({}) failed", name))?;
        ensure(!entry.upstream_org.is_empty(), || {
            format!("{} has no upstream organization", name)
        })?;
    }
    Ok(())
}

fn clean_empty(workspace: &Path, registry: &Registry) -> ScenarioResult {
    let report = clean(workspace, registry, CleanOptions::default());
    ensure(!report.has_failures(), || "clean reported failures".to_string())?;
    ensure(report.removed().count() == 0, || {
        "clean removed something from an empty workspace".to_string()
    })
}

fn clean_preserves_foreign(workspace: &Path, registry: &Registry) -> ScenarioResult {
    let (a, _) = two_names(registry)?;
    let foreign = workspace.join("not-a-registered-repository");
    write(&foreign, "README.md", "keep me\n")?;
    write(&foreign, "nested/data.bin", "\u{0}\u{1}\u{2}")?;
    write(workspace, &format!("{}/lakefile.toml", a), "name = \"x\"\n")?;
    write(workspace, CHECKOUT_MANIFEST, "{}\n")?;

    let before = snapshot(&foreign)?;
    let report = clean(workspace, registry, CleanOptions::default());

    ensure(!report.has_failures(), || "clean reported failures".to_string())?;
    ensure(!workspace.join(&a).exists(), || format!("{} was not removed", a))?;
    ensure(!workspace.join(CHECKOUT_MANIFEST).exists(), || {
        format!("{} was not removed", CHECKOUT_MANIFEST)
    })?;
    ensure(snapshot(&foreign)? == before, || {
        "foreign directory changed".to_string()
    })
}

fn mutual_fixture(workspace: &Path, a: &str, b: &str) -> ScenarioResult {
    write(
        workspace,
        &format!("{}/lakefile.toml", a),
        &format!(
            "name = \"{a}\"\n\n[[require]]\nname = \"{b}\"\ngit = \"https://example.com/{b}\"\nrev = \"main\"\n"
        ),
    )?;
    write(
        workspace,
        &format!("{}/lakefile.lean", b),
        &format!("import Lake\nopen Lake DSL\n\npackage {b} where\n\nrequire \"org\" / \"{a}\" @ git \"main\"\n"),
    )
}

fn rewrite_mutual(workspace: &Path, registry: &Registry) -> ScenarioResult {
    let (a, b) = two_names(registry)?;
    mutual_fixture(workspace, &a, &b)?;

    let report = rewrite_workspace(workspace, registry);
    ensure(!report.has_failures(), || "rewrite reported failures".to_string())?;

    let a_lakefile = read(&workspace.join(&a).join("lakefile.toml"))?;
    ensure(a_lakefile.contains(&format!("path = \"../{}\"", b)), || {
        format!("{} does not require ../{}:\n{}", a, b, a_lakefile)
    })?;
    ensure(!a_lakefile.contains("git ="), || {
        format!("{} still fetches {} remotely", a, b)
    })?;

    let b_lakefile = read(&workspace.join(&b).join("lakefile.lean"))?;
    ensure(
        b_lakefile.contains(&format!("from \"../{}\"", a)),
        || format!("{} does not require ../{}:\n{}", b, a, b_lakefile),
    )?;

    let root = report.root.map_err(|e| e.to_string())?;
    let dirs: Vec<&str> = root.requires.iter().map(|(_, p)| p.as_str()).collect();
    let expected_a = format!("./{}", a);
    let expected_b = format!("./{}", b);
    ensure(
        dirs.contains(&expected_a.as_str()) && dirs.contains(&expected_b.as_str()),
        || format!("root lakefile requires {:?}", dirs),
    )
}

fn rewrite_idempotent(workspace: &Path, registry: &Registry) -> ScenarioResult {
    let (a, b) = two_names(registry)?;
    mutual_fixture(workspace, &a, &b)?;

    rewrite_workspace(workspace, registry);
    let first = snapshot(workspace)?;
    let second_report = rewrite_workspace(workspace, registry);

    ensure(second_report.modified().count() == 0, || {
        "second rewrite modified manifests".to_string()
    })?;
    ensure(snapshot(workspace)? == first, || {
        "second rewrite changed the workspace".to_string()
    })
}

fn rewrite_foreign_untouched(workspace: &Path, registry: &Registry) -> ScenarioResult {
    let (a, b) = two_names(registry)?;
    let absent = third_name(registry).unwrap_or_else(|| "absent".to_string());
    let original = format!(
        "name = \"{a}\"\n\n[[require]]\nname = \"{absent}\"\ngit = \"https://example.com/{absent}\"\nrev = \"v1\"\n\n[[require]]\nname = \"unregistered\"\ngit = \"https://example.com/unregistered\"\n"
    );
    write(workspace, &format!("{}/lakefile.toml", a), &original)?;
    fs::create_dir_all(workspace.join(&b)).map_err(|e| e.to_string())?;

    let local = LocalCheckouts::scan(workspace, registry);
    ensure(!local.contains(&absent), || {
        format!("{} should not be checked out", absent)
    })?;

    rewrite_workspace(workspace, registry);
    let after = read(&workspace.join(&a).join("lakefile.toml"))?;
    ensure(after == original, || {
        format!("lakefile changed:\n{}", after)
    })
}
