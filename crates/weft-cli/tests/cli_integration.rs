//! Integration tests for the `weft` binary.
//!
//! Each test lays out a source root in a temporary directory and runs the
//! built binary against it.

use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn notices() -> Vec<Value> {
    vec![
        json!({"type": "copyright", "children": {"text": "(c) cli tests"}}),
        json!({"type": "license", "children": {"text": "MIT"}}),
    ]
}

fn write_module(root: &Path, relative: &str, decls: Vec<Value>) {
    let mut all = notices();
    all.extend(decls);
    let tree = json!({"type": "module", "children": {"declarations": all}});
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, tree.to_string()).unwrap();
}

fn class(name: &str, members: Vec<Value>) -> Value {
    json!({"type": "class", "children": {
        "name": name, "parents": [], "exported": true, "members": members
    }})
}

/// Source root with the core module and a one-class app whose `init`
/// sets a field
fn source_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "weft/core.json", vec![class("Object", vec![])]);
    let init = json!({"type": "method", "children": {
        "name": "init", "params": [], "mutating_this": true,
        "body": [{"type": "assign", "children": {
            "target": {"type": "field", "children": {"object": {"type": "this"}, "name": "greeting"}},
            "value": {"type": "str", "children": {"value": "hello"}}
        }}]
    }});
    write_module(
        dir.path(),
        "app.json",
        vec![
            class(
                "App",
                vec![
                    json!({"type": "field", "children": {"name": "greeting", "ty": {"type": "string"}}}),
                    init,
                ],
            ),
            json!({"type": "main", "children": {"path": ["App"]}}),
        ],
    );
    dir
}

fn weft(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weft"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("failed to launch weft")
}

#[test]
fn test_check_lists_modules() {
    let root = source_root();
    let out = weft(root.path(), &["check", "app", "--json"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let modules: Vec<Value> = serde_json::from_slice(&out.stdout).unwrap();
    let urls: Vec<&str> = modules.iter().filter_map(|m| m["url"].as_str()).collect();
    assert_eq!(urls, vec!["weft:core", "app"]);
    assert_eq!(modules[1]["checksum"].as_str().unwrap().len(), 64);
}

#[test]
fn test_run_prints_snapshot() {
    let root = source_root();
    let out = weft(root.path(), &["run", "app"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let snapshot: Value = serde_json::from_slice(&out.stdout).unwrap();
    let root_id = snapshot["root"]["value"].as_str().unwrap();
    let fields = &snapshot["objects"][root_id]["fields"];
    assert_eq!(fields["app#App.greeting"]["value"], "hello");
}

#[test]
fn test_run_then_restore() {
    let root = source_root();
    let saved = root.path().join("saved.json");
    let out = weft(root.path(), &["run", "app", "--output", saved.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = weft(root.path(), &["restore", "app", saved.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let restored: Value = serde_json::from_slice(&out.stdout).unwrap();
    let original: Value = serde_json::from_str(&std::fs::read_to_string(&saved).unwrap()).unwrap();
    assert_eq!(restored, original);
}

#[test]
fn test_config_file_is_honored() {
    let root = source_root();
    std::fs::write(root.path().join("weft.toml"), "entry_method = \"start\"\n").unwrap();
    let out = weft(root.path(), &["run", "app"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    // `init` is no longer the entry method, so the field keeps its default
    let snapshot: Value = serde_json::from_slice(&out.stdout).unwrap();
    let root_id = snapshot["root"]["value"].as_str().unwrap();
    assert_eq!(snapshot["objects"][root_id]["fields"]["app#App.greeting"]["value"], "");
}

#[test]
fn test_import_errors_fail() {
    let root = source_root();
    write_module(
        root.path(),
        "broken.json",
        vec![json!({"type": "import", "children": {"url": "missing", "name": "m"}})],
    );
    let out = weft(root.path(), &["check", "broken"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing"));
}
