use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const LAYOUT: &str = r#"
page_types:
  - name: report
    match: { contains: "Accident Report" }
    start_index: 1
    fields:
      date: { region: [0, 100, 0, 20], type: Date }
      vehicles: { region: [200, 260, 0, 20], type: Integer }
"#;

fn dump(vehicles: u32) -> String {
    format!(
        r#"{{"pages":[{{"number":1,"fragments":[
            {{"text":"Accident Report","region":[0,300,700,720]}},
            {{"text":"03/04/2019","region":[10,60,5,15]}},
            {{"text":"{vehicles}","region":[210,220,5,15]}}
        ]}}]}}"#
    )
}

/// A project directory using the default relative paths: `layout.yaml`,
/// `pdfs/` and `data/`.
fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("layout.yaml"), LAYOUT).unwrap();
    fs::create_dir(dir.path().join("pdfs")).unwrap();
    fs::write(dir.path().join("pdfs/AB1234.json"), dump(2)).unwrap();
    fs::write(dir.path().join("pdfs/CD0007.json"), dump(3)).unwrap();
    dir
}

fn layex(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("layex").unwrap();
    cmd.current_dir(dir)
        .arg("--config")
        .arg(dir.join("config.json"));
    cmd
}

#[test]
fn test_help() {
    Command::cargo_bin("layex")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("dump"));
}

#[test]
fn test_layout_check_valid() {
    let dir = project();
    layex(dir.path())
        .args(["layout", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_layout_check_rejects_reserved_field() {
    let dir = project();
    fs::write(
        dir.path().join("bad.yaml"),
        r#"
page_types:
  - name: report
    match: { contains: "Accident Report" }
    fields:
      case_id: { region: [0, 10, 0, 10] }
"#,
    )
    .unwrap();

    layex(dir.path())
        .args(["layout", "check", "bad.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid layout"));
}

#[test]
fn test_dump_text_with_layout() {
    let dir = project();
    layex(dir.path())
        .args(["dump", "pdfs/AB1234.json", "--layout", "layout.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Page 1 [report]"))
        .stdout(predicate::str::contains("03/04/2019"));
}

#[test]
fn test_dump_json_reads_back() {
    let dir = project();
    let output = layex(dir.path())
        .args(["dump", "pdfs/AB1234.json", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["pages"][0]["fragments"][0]["text"], "Accident Report");
}

#[test]
fn test_dump_missing_file() {
    let dir = project();
    layex(dir.path())
        .args(["dump", "pdfs/nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_parse_explicit_files_prints_records() {
    let dir = project();
    layex(dir.path())
        .args(["parse", "pdfs/AB1234.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""case_id":"AB-1234""#))
        .stdout(predicate::str::contains(r#""date":"2019-03-04""#))
        .stdout(predicate::str::contains(r#""vehicles":2"#));

    assert!(!dir.path().join("data/records-AB.json").exists());
}

#[test]
fn test_parse_stores_then_skips_parsed_documents() {
    let dir = project();
    layex(dir.path())
        .args(["parse", "-j", "2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("stored 2 of 2"));

    let shard = fs::read_to_string(dir.path().join("data/records-CD.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&shard).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["case_id"], "CD-0007");
    assert_eq!(records[0]["vehicles"], 3);
    assert_eq!(records[0]["parsed"], true);

    layex(dir.path())
        .arg("parse")
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing to parse"));

    layex(dir.path())
        .args(["parse", "--reparse-all", "-j", "1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("stored 2 of 2"));
}

#[test]
fn test_parse_records_unreadable_documents() {
    let dir = project();
    fs::write(dir.path().join("pdfs/EF0001.json"), "not json").unwrap();

    layex(dir.path())
        .args(["parse", "pdfs/EF0001.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""unreadable":true"#));
}

#[test]
fn test_parse_reparse_flags_conflict() {
    let dir = project();
    layex(dir.path())
        .args(["parse", "--reparse-all", "--reparse-old"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_parse_requires_layout() {
    let dir = project();
    layex(dir.path())
        .args(["parse", "--layout", "missing.yaml"])
        .assert()
        .failure();
}

#[test]
fn test_config_init_get_set() {
    let dir = tempfile::tempdir().unwrap();

    layex(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(dir.path().join("config.json").exists());

    layex(dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    layex(dir.path())
        .args(["config", "get", "parse.batch_size"])
        .assert()
        .success()
        .stdout("30\n");

    layex(dir.path())
        .args(["config", "set", "paths.document_dir", "scans"])
        .assert()
        .success();
    layex(dir.path())
        .args(["config", "get", "paths.document_dir"])
        .assert()
        .success()
        .stdout("scans\n");

    layex(dir.path())
        .args(["config", "set", "parse.nope", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
