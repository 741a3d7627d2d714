//! Layering guardrails to keep the engine crate independent of the front-end crate.
//!
//! `spekt_core` holds the tree and execution engine; `spekt` builds entry points, configuration and suites on top
//! of it. This test scans `crates/spekt_core/Cargo.toml` and fails if `spekt` appears in any dependency table.

fn dependency_tables(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit a dependency table.
        if line.starts_with('[') {
            in_dependencies = line.ends_with("dependencies]");
            continue;
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if let Some((name, _)) = line_no_comment.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[test]
fn engine_does_not_depend_on_front_end() {
    let manifest = include_str!("../crates/spekt_core/Cargo.toml");
    let names = dependency_tables(manifest);
    assert!(!names.is_empty(), "expected spekt_core to declare dependencies");
    assert!(
        !names.iter().any(|name| name == "spekt"),
        "`spekt` must not appear in spekt_core's dependency tables; move shared code into spekt_core instead"
    );
}

#[test]
fn front_end_depends_on_engine() {
    let manifest = include_str!("../Cargo.toml");
    let names = dependency_tables(manifest);
    assert!(names.iter().any(|name| name == "spekt_core"));
}
