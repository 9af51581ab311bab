//! Command-line interface: detect, track and config.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const BEFORE: &str = r#"
struct Invoice { lines: Vec<u32> }

impl Invoice {
    fn print(&self, rate: u32) -> String {
        let mut sum = 0;
        for line in &self.lines {
            sum += line;
        }
        let taxed = sum * rate;
        format!("total {}", taxed)
    }
}
"#;

const AFTER: &str = r#"
struct Invoice { lines: Vec<u32> }

impl Invoice {
    fn print(&self, rate: u32) -> String {
        let taxed = self.taxed_sum();
        format!("total {}", taxed)
    }

    fn taxed_sum(&self) -> u32 {
        let mut sum = 0;
        for line in &self.lines {
            sum += line;
        }
        let taxed = sum * rate;
        taxed
    }
}
"#;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_refactor-audit"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run refactor-audit")
}

fn write_history(dir: &Path) {
    let history = dir.join("history");
    fs::create_dir(&history).unwrap();
    for i in 1..=6 {
        let text = if i < 3 { BEFORE } else { AFTER };
        fs::write(history.join(format!("{i:04}.rs")), text).unwrap();
    }
}

#[test]
fn detect_reports_extraction() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("before.rs"), BEFORE).unwrap();
    fs::write(dir.path().join("after.rs"), AFTER).unwrap();

    let output = run(dir.path(), &["detect", "before.rs", "after.rs"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[extract-method]"));
    assert!(stdout.contains("Invoice::taxed_sum"));
}

#[test]
fn track_json_lists_the_missing_parameter() {
    let dir = TempDir::new().unwrap();
    write_history(dir.path());

    let output = run(dir.path(), &["track", "history", "--json"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let live = reports[0]["live"].as_array().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0]["key"]["condition"], "parameters");
    assert_eq!(live[0]["key"]["declaration"], "Invoice::taxed_sum");
    assert_eq!(live[0]["revision"], 6);
}

#[test]
fn track_text_output_previews_fixes() {
    let dir = TempDir::new().unwrap();
    write_history(dir.path());

    let output = run(dir.path(), &["track", "history", "--diff"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("does not pass `rate`"));
    assert!(stdout.contains("self.taxed_sum(rate)"));
}

#[test]
fn track_survives_unparsable_latest_snapshot() {
    let dir = TempDir::new().unwrap();
    write_history(dir.path());
    fs::write(
        dir.path().join("history").join("0007.rs"),
        "impl Invoice {\n    fn print(&self, rate: u32 -> String {\n",
    )
    .unwrap();

    let output = run(dir.path(), &["track", "history"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 document(s) tracked"));
    assert!(!stdout.contains("warning:"));
}

#[test]
fn track_rejects_empty_history() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("empty")).unwrap();

    let output = run(dir.path(), &["track", "empty"]);
    assert!(!output.status.success());
}

#[test]
fn config_prints_local_overrides() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("refactor-audit.toml"),
        "[search]\nlook_back_limit = 7\n",
    )
    .unwrap();

    let output = run(dir.path(), &["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("refactor-audit.toml"));
    assert!(stdout.contains("\"look_back_limit\": 7"));
}
