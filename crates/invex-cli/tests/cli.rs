use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `invex` with its configuration directory redirected into `home`.
fn invex(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("invex").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path()).env("HOME", home.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("models"));
}

#[test]
fn test_config_defaults() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .args(["config", "get", "pipeline.null_policy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keep_existing"));
}

#[test]
fn test_config_init_set_get() {
    let home = TempDir::new().unwrap();

    invex(&home).args(["config", "init"]).assert().success();
    invex(&home)
        .args(["config", "set", "generation.model", "llama3.2"])
        .assert()
        .success();
    invex(&home)
        .args(["config", "get", "generation.model"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llama3.2"));

    invex(&home)
        .args(["config", "set", "pipeline.null_policy", "sometimes"])
        .assert()
        .failure();
    invex(&home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_process_missing_input() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .args(["process", "/no/such/invoice.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_process_without_server_degrades_to_regex_keys() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("invoice.txt");
    fs::write(&input, "Invoice No: INV-7\nVendor: Acme\nTotal: 100.00\n").unwrap();

    invex(&home)
        .args(["process", "--base-url", "http://127.0.0.1:9", "--validate"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"invoice_number\": \"INV-7\""))
        .stdout(predicate::str::contains("multi_stage_extractor"))
        .stdout(predicate::str::contains("\"_validation\""));
}

#[test]
fn test_process_blank_document_fails() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("blank.txt");
    fs::write(&input, "   \n").unwrap();

    invex(&home)
        .args(["process", "--base-url", "http://127.0.0.1:9"])
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains("EmptyDocument"))
        .stderr(predicate::str::contains("Extraction failed"));
}

#[test]
fn test_batch_writes_summary() {
    let home = TempDir::new().unwrap();
    let docs = home.path().join("docs");
    let out = home.path().join("out");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), "Invoice No: A-1\nTotal: 5").unwrap();
    fs::write(docs.join("b.txt"), " ").unwrap();

    let pattern = format!("{}/*.txt", docs.display());
    invex(&home)
        .args(["batch", &pattern, "--summary", "--continue-on-error", "--base-url", "http://127.0.0.1:9"])
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful"));

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.contains("a.txt,success,1,A-1"));
    assert!(summary.contains("b.txt,error"));
    assert!(out.join("a.json").exists());
}

#[test]
fn test_batch_stops_on_error_but_keeps_earlier_outputs() {
    let home = TempDir::new().unwrap();
    let docs = home.path().join("docs");
    let out = home.path().join("out");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), "Invoice No: A-1\nTotal: 5").unwrap();
    fs::write(docs.join("b.txt"), " ").unwrap();
    fs::write(docs.join("c.txt"), "Invoice No: C-3\nTotal: 9").unwrap();

    let pattern = format!("{}/*.txt", docs.display());
    invex(&home)
        .args(["batch", &pattern, "--summary", "--base-url", "http://127.0.0.1:9"])
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("EmptyDocument"));

    assert!(out.join("a.json").exists());
    assert!(!out.join("c.json").exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.contains("a.txt,success,1,A-1"));
    assert!(summary.contains("b.txt,error"));
    assert!(!summary.contains("c.txt"));
}
