use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{tempdir, TempDir};

const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

fn registry_file() -> TempDir {
    let dir = tempdir().unwrap();
    let content = format!(r#"
        [[tool]]
        name = "alpha"
        version = "1.2.3"
        sha256 = "{DIGEST}"
        format = "tar-gz"
        url = "http://127.0.0.1:9/alpha-{{version}}.tar.gz"
        binaries = ["alpha"]
        groups = ["base"]

        [[tool]]
        name = "beta"
        version = "0.9.0"
        sha256 = "{DIGEST}"
        format = "raw-binary"
        url = "http://127.0.0.1:9/beta"
    "#);
    fs::write(dir.path().join("tools.toml"), content).unwrap();
    dir
}

fn toolbelt(registry: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("toolbelt").unwrap();
    cmd.arg("--registry").arg(registry.path().join("tools.toml"));
    cmd
}

#[test]
fn test_list_empty_registry() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("tools.toml");
    fs::write(&empty, "").unwrap();

    // An empty registry file is valid and lists nothing.
    Command::cargo_bin("toolbelt").unwrap()
        .args(["--registry", empty.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("available tools"));
}

#[test]
fn test_list_groups_and_other() {
    let registry = registry_file();
    let output = toolbelt(&registry)
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let output = String::from_utf8_lossy(&output);
    assert!(output.contains("[base]"));
    assert!(output.contains("[other]"));
    assert!(output.contains("alpha"));
    assert!(output.contains("v1.2.3"));
    assert!(output.find("[base]").unwrap() < output.find("[other]").unwrap());
}

#[test]
fn test_list_json() {
    let registry = registry_file();
    let output = toolbelt(&registry)
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let tools: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let tools = tools.as_array().unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["name"], "alpha");
    assert_eq!(tools[1]["format"], "raw-binary");
}

#[test]
fn test_install_without_tools_fails() {
    let registry = registry_file();
    let dest = tempdir().unwrap();
    toolbelt(&registry)
        .args(["install", "--dest", dest.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no tools specified"));
}

#[test]
fn test_install_unknown_group_selects_nothing() {
    let registry = registry_file();
    let dest = tempdir().unwrap();
    toolbelt(&registry)
        .args(["install", "--group", "nope", "--dest", dest.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no tools specified"));
}

#[test]
fn test_install_unknown_tool_fails() {
    let registry = registry_file();
    let dest = tempdir().unwrap();
    toolbelt(&registry)
        .args(["install", "gamma", "--dest", dest.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown tool 'gamma'"))
        .stderr(predicate::str::contains("1 of 1 tools failed"));
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[test]
fn test_install_missing_destination_fails() {
    let registry = registry_file();
    let dest = tempdir().unwrap();
    let missing = dest.path().join("does-not-exist");
    toolbelt(&registry)
        .args(["install", "alpha", "--dest", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_invalid_registry_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tools.toml");
    fs::write(&path, "[[tool]]\nname = \"x\"\n").unwrap();
    Command::cargo_bin("toolbelt").unwrap()
        .args(["--registry", path.to_str().unwrap(), "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not load registry"));
}
