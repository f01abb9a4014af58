//! Command-line surface tests
//!
//! These run the compiled `nebuild` binary against throwaway project roots.
//! Only steps that need no toolchain are exercised.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn nebuild_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_nebuild"))
}

#[test]
fn test_unknown_command_exits_2_and_does_nothing() {
    let bin = nebuild_binary();
    if !bin.exists() {
        eprintln!("Skipping test: nebuild binary not found at {:?}", bin);
        return;
    }
    let root = tempfile::tempdir().unwrap();

    let output = Command::new(&bin)
        .arg("--root")
        .arg(root.path())
        .arg("deploy")
        .output()
        .expect("Failed to execute nebuild");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown command: deploy"));
    assert!(!root.path().join("temp").exists(), "no step may run");
}

#[test]
fn test_clean_creates_fresh_temp_tree() {
    let bin = nebuild_binary();
    if !bin.exists() {
        eprintln!("Skipping test: nebuild binary not found at {:?}", bin);
        return;
    }
    let root = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("temp/build")).unwrap();
    fs::write(root.path().join("temp/build/CMakeCache.txt"), "stale").unwrap();
    let report = root.path().join("report.json");

    let output = Command::new(&bin)
        .args(["--root"])
        .arg(root.path())
        .arg("clean")
        .arg("--report")
        .arg(&report)
        .output()
        .expect("Failed to execute nebuild clean");

    assert!(
        output.status.success(),
        "clean failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!root.path().join("temp/build/CMakeCache.txt").exists());
    assert!(root.path().join("temp/download").is_dir());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["verdict"], "success");
    assert_eq!(json["diagnostics"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_invalid_config_is_reported() {
    let bin = nebuild_binary();
    if !bin.exists() {
        eprintln!("Skipping test: nebuild binary not found at {:?}", bin);
        return;
    }
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("nebuild.toml"), "[build\n").unwrap();

    let output = Command::new(&bin)
        .arg("clean")
        .arg("--root")
        .arg(root.path())
        .output()
        .expect("Failed to execute nebuild");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nebuild.toml"));
}
