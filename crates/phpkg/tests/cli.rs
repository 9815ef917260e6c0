use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn create_workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    fs::write(dir.path().join("lib.php"), "<?php\nclass Widget {}\n").unwrap();
    fs::write(
        dir.path().join("main.php"),
        "<?php\n$w = new Widget();\n$unused = 1;\necho $w;\n",
    )
    .unwrap();
    dir
}

fn phpkg() -> Command {
    Command::cargo_bin("phpkg").expect("binary should build")
}

fn json_stdout(command: &mut Command) -> Value {
    let output = command.output().expect("failed to run phpkg");
    assert!(output.status.success(), "phpkg failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_index_prints_summary_and_stats() {
    let workspace = create_workspace();
    let stats = workspace.path().join("stats.json");

    phpkg()
        .arg("index")
        .arg(workspace.path())
        .args(["--threads", "2", "--stats"])
        .arg(&stats)
        .assert()
        .success()
        .stdout(predicate::str::contains("Files processed: 2"));

    let saved: Value = serde_json::from_str(&fs::read_to_string(stats).unwrap()).unwrap();
    assert_eq!(saved["processed_files"], 2);
}

#[test]
fn test_query_definition_points_at_declaration() {
    let workspace = create_workspace();

    let answer = json_stdout(
        phpkg()
            .arg("query")
            .arg(workspace.path())
            .args(["main.php", "2", "10", "--kind", "definition"]),
    );

    let locations = answer.as_array().expect("definition returns a list");
    assert_eq!(locations.len(), 1);
    assert!(locations[0]["uri"].as_str().unwrap().ends_with("lib.php"));
}

#[test]
fn test_diagnostics_report_unused_variables() {
    let workspace = create_workspace();

    let answer = json_stdout(
        phpkg()
            .arg("diagnostics")
            .arg(workspace.path())
            .arg("main.php"),
    );

    let messages: Vec<&str> = answer
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["message"].as_str())
        .collect();
    assert_eq!(messages, vec!["Variable $unused is assigned but never used"]);
}

#[test]
fn test_query_outside_file_fails() {
    let workspace = create_workspace();

    phpkg()
        .arg("query")
        .arg(workspace.path())
        .args(["main.php", "99", "1", "--kind", "hover"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside the file"));
}
