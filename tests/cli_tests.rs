#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixture;
use serde_json::Value;
use std::ffi::OsStr;
use std::process::{Command, Output};

fn run(args: &[&OsStr]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_openapi-glue-gen"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run openapi-glue-gen")
}

#[test]
fn test_checksum_only_prints_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let spec = fixture("petstore-v3.yaml");
    let output = run(&[
        OsStr::new("-c"),
        OsStr::new("-p"),
        OsStr::new("pets"),
        OsStr::new("-b"),
        dir.path().as_os_str(),
        spec.as_os_str(),
    ]);
    assert!(output.status.success());

    let manifest: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["projectName"], "pets");
    assert_eq!(manifest["files"]["src/lib.rs"].as_str().unwrap().len(), 64);
    assert!(!dir.path().join("pets").exists());
}

#[test]
fn test_generates_project() {
    let dir = tempfile::tempdir().unwrap();
    let spec = fixture("petstore-v2.json");
    let output = run(&[
        OsStr::new("-p"),
        OsStr::new("petstore"),
        OsStr::new("-b"),
        dir.path().as_os_str(),
        spec.as_os_str(),
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Project 'petstore' generated in"));

    let project = dir.path().join("petstore");
    assert!(project.join("Cargo.toml").is_file());
    assert!(project.join("src/service.rs").is_file());
    assert!(project.join("src/security.rs").is_file());
}

#[test]
fn test_invalid_specification_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("bad.json");
    std::fs::write(&spec, r#"{"swagger": "1.2"}"#).unwrap();
    let output = run(&[OsStr::new("-c"), spec.as_os_str()]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(openapi_glue::INVALID_SPECIFICATION));
}

#[test]
fn test_missing_specification_argument_exits_1() {
    let output = run(&[OsStr::new("-c")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stdout.is_empty());
}

#[test]
fn test_help_exits_0() {
    let output = run(&[OsStr::new("--help")]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
}
