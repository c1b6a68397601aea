#![allow(deprecated)]
use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use tempfile::TempDir;

const OBJECT: &str = r"^/rest/objects/[0-9a-f-]{36}$";
const CONTENT: &str = r"^/rest/objects/[0-9a-f-]{36}/ds1/fcr:content$";
const DATASTREAM: &str = r"^/rest/objects/[0-9a-f-]{36}/ds1$";

const FCREPO4_LANDING: &str = "<html><head><title>Fedora Commons Repository 4.0</title></head>\
    <body>You probably want to visit something a little more interesting, such as:\
    <a href=\"rest\">the Fedora REST API endpoint</a></body></html>";

fn fcbench(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fcbench").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("FCBENCH_URL")
        .env_remove("FCBENCH_PASSWORD")
        .env_remove("FCBENCH_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn regex(pattern: &str) -> Matcher {
    Matcher::Regex(pattern.to_string())
}

// ---------------------------------------------------------------------------
// argument handling
// ---------------------------------------------------------------------------

#[test]
fn help_lists_benchmark_flags() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--fedora-url"))
        .stdout(predicate::str::contains("--actions-per-tx"))
        .stdout(predicate::str::contains("--parallel-tx"));
}

#[test]
fn unknown_action_is_rejected() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["-a", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid action"));
}

#[test]
fn unknown_transaction_mode_is_rejected() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["-x", "sometimes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid transaction mode"));
}

// ---------------------------------------------------------------------------
// fcbench config
// ---------------------------------------------------------------------------

#[test]
fn config_show_merges_file_and_flags() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.yaml");
    std::fs::write(&path, "num_actions: 25\naction: update\nsize: 10\n").unwrap();

    let output = fcbench(&dir)
        .args(["-c", path.to_str().unwrap(), "-s", "4096", "--json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let cfg: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(cfg["num_actions"], 25);
    assert_eq!(cfg["action"], "update");
    assert_eq!(cfg["size"], 4096);
}

#[test]
fn config_show_redacts_password() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["-u", "fedoraAdmin", "-p", "hunter2", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fedoraAdmin"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn config_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["-t", "0", "config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] num_threads"));
}

#[test]
fn config_validate_clean() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn invalid_config_refuses_to_run() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["-n", "0", "-f", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

// ---------------------------------------------------------------------------
// benchmark runs against a stand-in repository
// ---------------------------------------------------------------------------

#[test]
fn ingest_run_against_fedora4() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(FCREPO4_LANDING)
        .create();
    server.mock("GET", "/rest").with_status(200).with_body("").create();
    let objects = server
        .mock("POST", regex(OBJECT))
        .with_status(201)
        .expect(3)
        .create();
    let ingests = server
        .mock("POST", regex(CONTENT))
        .with_status(201)
        .expect(3)
        .create();
    let ds_deletes = server
        .mock("DELETE", regex(DATASTREAM))
        .with_status(204)
        .expect(3)
        .create();
    let obj_deletes = server
        .mock("DELETE", regex(OBJECT))
        .with_status(204)
        .expect(3)
        .create();

    let output = fcbench(&dir)
        .args(["-f", &server.url(), "-n", "3", "-s", "100", "-t", "2", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["action"], "ingest");
    assert_eq!(summary["repository_version"], "fcrepo4");
    assert_eq!(summary["completed"], 3);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["total_bytes"], 300);
    assert_eq!(summary["cluster_size_before"], 0);

    let log = std::fs::read_to_string(dir.path().join("durations.log")).unwrap();
    assert_eq!(log.lines().count(), 3);

    objects.assert();
    ingests.assert();
    ds_deletes.assert();
    obj_deletes.assert();
}

#[test]
fn transactional_run_commits_each_batch() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let location = format!("{}/rest/tx:bench", server.url());
    server.mock("GET", "/rest").with_status(200).with_body("").create();
    server.mock("POST", regex(OBJECT)).with_status(201).create();
    server.mock("DELETE", regex(OBJECT)).with_status(204).create();
    server.mock("DELETE", regex(DATASTREAM)).with_status(204).create();
    let creates = server
        .mock("POST", "/rest/fcr:tx")
        .with_status(201)
        .with_header("location", &location)
        .expect(2)
        .create();
    let members = server
        .mock(
            "POST",
            regex(r"^/rest/tx:bench/objects/[0-9a-f-]{36}/ds1/fcr:content$"),
        )
        .with_status(201)
        .expect(4)
        .create();
    let commits = server
        .mock("POST", "/rest/tx:bench/fcr:tx/fcr:commit")
        .with_status(204)
        .expect(2)
        .create();

    let log = dir.path().join("tx.log");
    let output = fcbench(&dir)
        .args([
            "-f",
            &server.url(),
            "--repository-version",
            "fcrepo4",
            "-n",
            "4",
            "-x",
            "commit",
            "--actions-per-tx",
            "2",
            "-l",
            log.to_str().unwrap(),
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["failed"], 0);
    // four ingests plus two creates and two commits
    assert_eq!(summary["completed"], 8);
    assert_eq!(summary["transactions"]["opened"], 2);
    assert_eq!(summary["transactions"]["mode"], "commit");

    creates.assert();
    members.assert();
    commits.assert();
}

#[test]
fn failed_actions_are_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    server.mock("GET", "/rest").with_status(200).with_body("").create();
    server.mock("POST", regex(OBJECT)).with_status(201).create();
    server.mock("POST", regex(CONTENT)).with_status(500).create();

    let output = fcbench(&dir)
        .args([
            "-f",
            &server.url(),
            "--repository-version",
            "fcrepo4",
            "-n",
            "2",
            "--no-purge",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["completed"], 0);
    assert_eq!(summary["failed"], 2);
}

#[test]
fn unreachable_repository_fails() {
    let dir = TempDir::new().unwrap();
    fcbench(&dir)
        .args(["-f", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to connect"));
}
