//! CLI behavior tests: exit codes, output formats, init.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ESSAY: &str = "Rust is a systems programming language focused on memory safety. \
The ownership model lets the compiler check memory access at compile time. \
Borrowing rules prevent data races in concurrent Rust programs.\n\n\
However, the borrow checker can feel strict to new Rust programmers. \
With practice, ownership and borrowing become natural.";

const SHORT_NOTE: &str = "Teh cat sat on the mat and it was was very happy about it all day.";

fn quill_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_quill"));
    cmd.current_dir(dir.path()).env_remove("ANTHROPIC_API_KEY").env_remove("QUILL_LOG");
    cmd
}

fn workspace_with_essay() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("essay.txt"), ESSAY).unwrap();
    dir
}

#[test]
fn no_args_returns_error_not_panic() {
    let dir = TempDir::new().unwrap();
    quill_cmd(&dir)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("PATH"));
}

#[test]
fn below_threshold_exit_1() {
    let dir = workspace_with_essay();
    quill_cmd(&dir)
        .args(["essay.txt", "--threshold", "100", "--no-cache"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("below threshold"));
}

#[test]
fn zero_threshold_passes() {
    let dir = workspace_with_essay();
    quill_cmd(&dir)
        .args(["essay.txt", "--threshold", "0", "--no-cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Grammar"));
}

#[test]
fn json_output_valid() {
    let dir = workspace_with_essay();
    let output = quill_cmd(&dir)
        .args(["essay.txt", "--json", "--no-cache", "--topic", "Rust"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let s = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(s.trim()).expect("valid JSON");
    assert!(value.get("overallScore").is_some());
    assert!(value["relevance"]["score"].is_number());
}

#[test]
fn file_not_found_exit_2() {
    let dir = TempDir::new().unwrap();
    quill_cmd(&dir)
        .arg("missing.txt")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn too_short_text_reports_and_exits_2() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tiny.txt"), "Too short.").unwrap();
    quill_cmd(&dir)
        .args(["tiny.txt", "--no-cache"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("too short"));
}

#[test]
fn reads_text_from_stdin() {
    let dir = TempDir::new().unwrap();
    quill_cmd(&dir)
        .args(["-", "--quiet", "--no-cache"])
        .write_stdin(ESSAY)
        .assert()
        .success()
        .stdout(predicate::str::contains("<stdin>"));
}

#[test]
fn directory_with_compare_emits_comparison() {
    let dir = workspace_with_essay();
    fs::write(dir.path().join("note.md"), SHORT_NOTE).unwrap();
    fs::write(dir.path().join("ignored.rs"), "fn main() {}").unwrap();

    let output = quill_cmd(&dir)
        .args([".", "--json", "--compare", "--no-cache"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["results"].as_array().map(|r| r.len()), Some(2));
    assert_eq!(value["inputs"].as_array().map(|r| r.len()), Some(2));
    assert!(value["comparativeAnalysis"]["bestTextIndex"].is_number());
}

#[test]
fn cache_file_written_and_cleared() {
    let dir = workspace_with_essay();
    quill_cmd(&dir).args(["essay.txt", "--quiet"]).assert().success();
    let cache = dir.path().join(".quill-cache.json");
    assert!(cache.exists());

    quill_cmd(&dir)
        .args(["essay.txt", "--quiet", "--clear-cache", "--no-cache"])
        .assert()
        .success();
    assert!(!cache.exists());
}

#[test]
fn custom_weights_are_applied() {
    let dir = workspace_with_essay();
    let output = quill_cmd(&dir)
        .args(["essay.txt", "--json", "--no-cache", "--weight", "grammar=1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["weights"]["grammar"], 1.0);
    assert_eq!(value["weights"]["coherence"], 0.0);
}

#[test]
fn malformed_weight_is_a_usage_error() {
    let dir = workspace_with_essay();
    quill_cmd(&dir)
        .args(["essay.txt", "--weight", "grammar"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("FACET=WEIGHT"));
}

#[test]
fn init_creates_config() {
    let dir = TempDir::new().unwrap();
    quill_cmd(&dir)
        .args(["init", "--threshold", "70", "--dir"])
        .arg(dir.path())
        .assert()
        .success();

    let path = dir.path().join(".quillrc.json");
    let content = fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["threshold"], 70);

    // Second run leaves the file alone
    quill_cmd(&dir)
        .args(["init", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn config_threshold_is_honored() {
    let dir = workspace_with_essay();
    fs::write(dir.path().join(".quillrc.json"), r#"{"threshold": 100}"#).unwrap();
    quill_cmd(&dir)
        .args(["essay.txt", "--quiet", "--no-cache"])
        .assert()
        .failure()
        .code(1);
}
