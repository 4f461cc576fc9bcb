//! Property-based tests for the lakefile rewriters.
//!
//! These tests generate lakefiles with a mix of local and remote
//! dependencies and check that rewriting settles after one pass and never
//! touches a dependency that is not checked out.

#[cfg(test)]
mod proptest_tests {
    use crate::lakefile::{lean, toml as lake_toml, LocalCheckouts};
    use proptest::prelude::*;
    use toml::{Table, Value};

    const POOL: &[&str] = &["alpha", "beta", "gamma", "delta"];

    #[derive(Debug, Clone)]
    struct Require {
        name: &'static str,
        rev: String,
        sub_dir: Option<String>,
        form: usize,
    }

    fn require_strategy() -> impl Strategy<Value = Require> {
        (
            prop::sample::select(POOL),
            "[a-z0-9]{1,8}",
            prop::option::of("[a-z]{1,5}"),
            0usize..6,
        )
            .prop_map(|(name, rev, sub_dir, form)| Require {
                name,
                rev,
                sub_dir,
                form,
            })
    }

    fn local_strategy() -> impl Strategy<Value = LocalCheckouts> {
        prop::sample::subsequence(POOL, 0..=POOL.len())
            .prop_map(|names| LocalCheckouts::new(names.into_iter().map(str::to_string)))
    }

    fn render_toml(requires: &[Require]) -> String {
        let mut out = String::from("name = \"root\"\n");
        for r in requires {
            out.push_str(&format!(
                "\n[[require]]\nname = \"{}\"\ngit = \"https://example.com/{}\"\nrev = \"{}\"\n",
                r.name, r.name, r.rev
            ));
            if let Some(sub) = &r.sub_dir {
                out.push_str(&format!("subDir = \"{}\"\n", sub));
            }
        }
        out
    }

    fn render_lean_require(r: &Require) -> String {
        match r.form {
            0 => format!("require {}", r.name),
            1 => format!("require \"org\" / \"{}\" @ git \"{}\"", r.name, r.rev),
            2 => format!("require «{}» @ \"{}\"", r.name, r.rev),
            3 => format!(
                "require {} from git \"https://example.com/{}\" @ \"{}\"",
                r.name, r.name, r.rev
            ),
            4 => format!(
                "require {} from git \"https://example.com/{}\" @ \"{}\"{}",
                r.name,
                r.name,
                r.rev,
                r.sub_dir
                    .as_ref()
                    .map(|sub| format!(" / \"{}\"", sub))
                    .unwrap_or_default()
            ),
            _ => format!("-- require {} @ git \"{}\"", r.name, r.rev),
        }
    }

    /// The line a require should read after rewriting against `local`.
    fn expected_lean_require(r: &Require, local: &LocalCheckouts) -> String {
        if !local.contains(r.name) || r.form == 5 {
            return render_lean_require(r);
        }
        match (&r.sub_dir, r.form) {
            (Some(sub), 4) => format!("require {} from \"../{}/{}\"", r.name, r.name, sub),
            _ => format!("require {} from \"../{}\"", r.name, r.name),
        }
    }

    fn render_lean(requires: &[Require]) -> String {
        let mut out = String::from("import Lake\nopen Lake DSL\n\n");
        for r in requires {
            out.push_str(&render_lean_require(r));
            out.push('\n');
        }
        out.push_str("\npackage root where\n");
        out
    }

    fn requires_of(content: &str) -> Vec<Table> {
        let doc: Table = content.parse().unwrap();
        match doc.get("require") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_table().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    proptest! {
        /// Property: a rewritten lakefile.toml needs no second rewrite
        #[test]
        fn toml_rewrite_is_idempotent(
            requires in prop::collection::vec(require_strategy(), 0..6),
            local in local_strategy(),
        ) {
            let original = render_toml(&requires);
            let once = lake_toml::rewrite(&original, &local, "../")
                .unwrap()
                .unwrap_or(original);
            let twice = lake_toml::rewrite(&once, &local, "../").unwrap();
            prop_assert!(twice.is_none(), "second pass changed:\n{}", once);
        }

        /// Property: requires of packages that are not checked out keep every key
        #[test]
        fn toml_rewrite_leaves_remote_requires(
            requires in prop::collection::vec(require_strategy(), 1..6),
            local in local_strategy(),
        ) {
            let original = render_toml(&requires);
            let rewritten = lake_toml::rewrite(&original, &local, "../")
                .unwrap()
                .unwrap_or_else(|| original.clone());

            let before = requires_of(&original);
            let after = requires_of(&rewritten);
            prop_assert_eq!(before.len(), after.len());

            for (old, new) in before.iter().zip(&after) {
                let name = old.get("name").and_then(Value::as_str).unwrap();
                if local.contains(name) {
                    prop_assert!(!new.contains_key("git"));
                    let path = new.get("path").and_then(Value::as_str).unwrap();
                    let expected = format!("../{}", name);
                    prop_assert!(path.starts_with(&expected));
                } else {
                    prop_assert_eq!(old, new);
                }
            }
        }

        /// Property: a rewritten lakefile.lean needs no second rewrite
        #[test]
        fn lean_rewrite_is_idempotent(
            requires in prop::collection::vec(require_strategy(), 0..6),
            local in local_strategy(),
        ) {
            let original = render_lean(&requires);
            let once = lean::rewrite(&original, &local, "../")
                .unwrap()
                .unwrap_or(original);
            let twice = lean::rewrite(&once, &local, "../").unwrap();
            prop_assert!(twice.is_none(), "second pass changed:\n{}", once);
        }

        /// Property: local requires point into the workspace, all others survive verbatim
        #[test]
        fn lean_rewrite_leaves_remote_requires(
            requires in prop::collection::vec(require_strategy(), 1..6),
            local in local_strategy(),
        ) {
            let original = render_lean(&requires);
            let rewritten = lean::rewrite(&original, &local, "../")
                .unwrap()
                .unwrap_or_else(|| original.clone());
            let lines: Vec<&str> = rewritten.lines().collect();

            for r in &requires {
                let line = expected_lean_require(r, &local);
                prop_assert!(lines.contains(&line.as_str()), "missing {}", line);
            }
            prop_assert!(rewritten.contains("package root where"));
        }
    }
}
