//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `wxml` binary and verify exit codes,
//! stdout content, and stderr content. Fixtures are written to a temp dir.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn wxml() -> Command {
    cargo_bin_cmd!("wxml")
}

/// Write `text` to `name` inside a fresh temp dir.
fn fixture(name: &str, text: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(name);
    fs::write(&path, text).expect("write fixture");
    (dir, path)
}

/// Frame a JSON-RPC message the way the LSP base protocol does.
fn frame(body: serde_json::Value) -> String {
    let body = body.to_string();
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
}

// ──────────────────────────────────────────────
// Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    wxml()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WXML language server and checker"));
}

#[test]
fn version_exits_0() {
    wxml()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wxml"));
}

#[test]
fn check_requires_a_file() {
    wxml().arg("check").assert().failure();
}

// ──────────────────────────────────────────────
// check
// ──────────────────────────────────────────────

#[test]
fn check_clean_file_exits_0() {
    let (_dir, path) = fixture("index.wxml", "<view class=\"a\"><text>hi</text></view>\n");
    wxml()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 file(s) checked: 0 error(s), 0 warning(s)"));
}

#[test]
fn check_reports_errors_with_positions() {
    let (_dir, path) = fixture("index.wxml", "<view>\n  <view abc=\"1\"></view>\n</view>\n");
    wxml()
        .arg("check")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("index.wxml:2:9: error: Unknown attribute \"abc\""))
        .stdout(predicate::str::contains("1 error(s), 0 warning(s)"));
}

#[test]
fn check_warnings_do_not_fail() {
    let (_dir, path) = fixture(
        "index.wxml",
        "<view wx:if=\"{{a}}\"></view><view wx:else=\"x\"></view>",
    );
    wxml()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "index.wxml:1:34: warning: Unnecessary value for \"wx:else\"",
        ));
}

#[test]
fn check_resolves_includes_next_to_the_file() {
    let (dir, path) = fixture(
        "index.wxml",
        "<include src=\"./header.wxml\"/>\n<import src=\"./missing.wxml\"/>\n",
    );
    fs::write(dir.path().join("header.wxml"), "<view></view>").unwrap();
    let output = wxml()
        .args(["--output", "json", "check"])
        .arg(&path)
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    let diags = value[0]["diagnostics"].as_array().expect("diagnostics");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0]["severity"], "error");
    assert!(diags[0]["message"].as_str().unwrap().contains("missing.wxml"));
    assert_eq!(diags[0]["start"]["line"], 1);
}

#[test]
fn check_many_files() {
    let (dir, good) = fixture("good.wxml", "<view></view>");
    let bad = dir.path().join("bad.wxml");
    fs::write(&bad, "<view>").unwrap();
    wxml()
        .arg("check")
        .arg(&good)
        .arg(&bad)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("bad.wxml:1:2: error: Parse error: Close tag not found for <view>"))
        .stdout(predicate::str::contains("good.wxml").not())
        .stdout(predicate::str::contains("2 file(s) checked"));
}

#[test]
fn check_quiet_omits_summary() {
    let (_dir, path) = fixture("index.wxml", "<view></view>");
    wxml()
        .args(["--quiet", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn check_missing_file_exits_1() {
    wxml()
        .args(["check", "does/not/exist.wxml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error reading"));
}

#[test]
fn check_missing_file_json_error() {
    wxml()
        .args(["--output", "json", "check", "does/not/exist.wxml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\"error\""));
}

// ──────────────────────────────────────────────
// parse and tokens
// ──────────────────────────────────────────────

#[test]
fn parse_prints_tree() {
    wxml()
        .args(["parse", "-"])
        .write_stdin("<view class=\"a\"><text>hi</text></view>")
        .assert()
        .success()
        .stdout(predicate::str::contains("<view> 0..38"))
        .stdout(predicate::str::contains("  @class=\"a\""))
        .stdout(predicate::str::contains("  <text> 16..31"))
        .stdout(predicate::str::contains("    \"hi\""));
}

#[test]
fn parse_prints_errors() {
    wxml()
        .args(["parse", "-"])
        .write_stdin("<view>")
        .assert()
        .success()
        .stdout(predicate::str::contains("(unclosed)"))
        .stdout(predicate::str::contains("error: 1..4: Close tag not found for <view>"));
}

#[test]
fn parse_json() {
    let output = wxml()
        .args(["--output", "json", "parse", "-"])
        .write_stdin("<view><image src=\"a.png\"/></view>")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value["roots"][0]["tag"], "view");
    assert_eq!(value["roots"][0]["children"][0]["tag"], "image");
    assert_eq!(value["roots"][0]["children"][0]["attributes"][0]["value"], "a.png");
    assert_eq!(value["errors"], serde_json::json!([]));
}

#[test]
fn tokens_text() {
    wxml()
        .args(["tokens", "-"])
        .write_stdin("<view></view>")
        .assert()
        .success()
        .stdout(predicate::str::contains("StartTagOpen"))
        .stdout(predicate::str::contains("\"view\""))
        .stdout(predicate::str::contains("EndTagClose"));
}

#[test]
fn tokens_json() {
    let output = wxml()
        .args(["--output", "json", "tokens", "-"])
        .write_stdin("<view a=\"1\">")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    let kinds: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        [
            "StartTagOpen",
            "StartTag",
            "Whitespace",
            "AttributeName",
            "DelimiterAssign",
            "AttributeValue",
            "StartTagClose"
        ]
    );
    assert_eq!(value[5]["text"], "\"1\"");
    assert_eq!(value[5]["offset"], 8);
}

// ──────────────────────────────────────────────
// lsp and logging
// ──────────────────────────────────────────────

#[test]
fn lsp_initialize_and_shutdown() {
    let input = [
        frame(serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "capabilities": {} }
        })),
        frame(serde_json::json!({ "jsonrpc": "2.0", "method": "initialized", "params": {} })),
        frame(serde_json::json!({ "jsonrpc": "2.0", "id": 2, "method": "shutdown" })),
        frame(serde_json::json!({ "jsonrpc": "2.0", "method": "exit" })),
    ]
    .concat();
    wxml()
        .args(["lsp", "--stdio"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Content-Length:"))
        .stdout(predicate::str::contains("\"hoverProvider\":true"));
}

#[test]
fn debug_logs_go_to_log_file() {
    let (dir, path) = fixture("index.wxml", "<view></view>");
    let log = dir.path().join("wxml.log");
    wxml()
        .arg("--debug")
        .arg("--log-file")
        .arg(&log)
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
    let logged = fs::read_to_string(&log).expect("log file written");
    assert!(logged.contains("checked"), "log was: {logged}");
}
