//! Integration tests for the `vlx` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise the check, convert,
//! inspect, and stats subcommands through the actual binary, including
//! stdin/stdout piping, file I/O, error handling, and text ↔ binary conversion.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the scene.vlx fixture.
fn scene_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/scene.vlx")
}

fn vlx() -> Command {
    Command::cargo_bin("vlx").unwrap()
}

/// Helper: a per-test scratch file under the system temp directory.
fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("vlx-cli-{}-{name}", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_fixture() {
    vlx()
        .args(["check", "-i", scene_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("<Scene>: ok (4 structures, 2 references)"));
}

#[test]
fn check_stdin() {
    vlx()
        .arg("check")
        .write_stdin("VLX version=100 encoding=ascii <Root> { }")
        .assert()
        .success()
        .stdout(predicate::str::contains("<Root>: ok"));
}

#[test]
fn check_reports_parse_error_line() {
    vlx()
        .arg("check")
        .write_stdin("VLX version=100 encoding=ascii\n<Root>\n{\n  x = <Tag> 5\n}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Line 4: parse error at '5'."));
}

#[test]
fn check_reports_unresolved_uid() {
    vlx()
        .arg("check")
        .write_stdin("VLX version=100 encoding=ascii <Root> { r = #ghost }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unresolved UID #ghost"));
}

#[test]
fn check_reports_duplicate_uid() {
    vlx()
        .arg("check")
        .write_stdin("VLX version=100 encoding=ascii <Root> { l = [ <A> { ID = #a } <B> { ID = #a } ] }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate UID #a"));
}

#[test]
fn check_logs_detected_format() {
    vlx()
        .args(["check", "-i", scene_path()])
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("VLX text"));
}

#[test]
fn check_missing_file() {
    vlx()
        .args(["check", "-i", "/nonexistent/scene.vlx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// convert
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn convert_to_text_normalizes_layout() {
    vlx()
        .args(["convert", "--to", "text", "-i", scene_path()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("VLX version=100 encoding=ascii\n\n<Scene>\n{\n"))
        .stdout(predicate::str::contains("\tname = \"demo\"\n"))
        .stdout(predicate::str::contains("ID = #mat"))
        .stdout(predicate::str::contains("indices = ( 0 1 2 )"));
}

#[test]
fn convert_to_binary_writes_magic() {
    let output = vlx()
        .args(["convert", "--to", "binary", "-i", scene_path()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(&output.stdout[..4], &[0xAB, b'V', b'L', b'X']);
}

#[test]
fn text_binary_text_roundtrip() {
    let binary_path = temp_path("roundtrip.vlb");

    vlx()
        .args(["convert", "--to", "binary", "-i", scene_path(), "-o", &binary_path])
        .assert()
        .success();

    let direct = vlx()
        .args(["convert", "--to", "text", "-i", scene_path()])
        .output()
        .unwrap();
    let via_binary = vlx()
        .args(["convert", "--to", "text", "-i", &binary_path])
        .output()
        .unwrap();
    assert!(via_binary.status.success());
    assert_eq!(
        String::from_utf8_lossy(&direct.stdout),
        String::from_utf8_lossy(&via_binary.stdout)
    );

    vlx().args(["check", "-i", &binary_path]).assert().success();
    let _ = std::fs::remove_file(&binary_path);
}

#[test]
fn convert_requires_target() {
    vlx()
        .args(["convert", "-i", scene_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--to"));
}

#[test]
fn convert_rejects_garbage() {
    vlx()
        .args(["convert", "--to", "text"])
        .write_stdin("{\"json\": true}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse VLX text"));
}

// ─────────────────────────────────────────────────────────────────────────────
// inspect / stats
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn inspect_outputs_json() {
    let output = vlx().args(["inspect", "-i", scene_path()]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["@tag"], "<Scene>");
    assert_eq!(json["name"], "demo");
    assert_eq!(json["material"]["@uid"], "#mat");
    assert_eq!(json["meshes"][0]["indices"], serde_json::json!([0, 1, 2, 2, 3, 0]));
    assert_eq!(json["meshes"][1]["material"], "#mat");
}

#[test]
fn inspect_pretty_is_indented() {
    vlx()
        .args(["inspect", "--pretty", "-i", scene_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\n  \"@tag\": \"<Scene>\""));
}

#[test]
fn stats_fields() {
    let output = vlx().args(["stats", "-i", scene_path()]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["structures"], 4);
    assert_eq!(json["lists"], 1);
    assert_eq!(json["rawtext_blocks"], 1);
    assert_eq!(json["integer_arrays"], 2);
    assert_eq!(json["integer_elements"], 9);
    assert_eq!(json["real_arrays"], 1);
    assert_eq!(json["uid_references"], 2);
    assert_eq!(json["declared_uids"], 1);
    assert!(json["binary_bytes"].as_u64().unwrap() < json["text_bytes"].as_u64().unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    vlx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn unknown_subcommand_fails() {
    vlx()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error").or(predicate::str::contains("unrecognized")));
}
