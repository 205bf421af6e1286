use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;
use riskgate_core::{read_audit, AuditResult};
use tempfile::TempDir;

/// Serve `200 OK` to every connection on an ephemeral port.
fn healthy_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let body = r#"{"status":"ok"}"#;
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
        }
    });
    format!("http://{addr}/health")
}

fn riskgate(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("riskgate").expect("riskgate binary");
    cmd.current_dir(cwd)
        .env_remove("RISKGATE_HEALTH_URL")
        .env_remove("RISKGATE_COPY_TO")
        .env_remove("RISKGATE_LOG");
    cmd
}

fn content_sources(dir: &Path) {
    fs::write(dir.join("INDEX.md"), "# index\n").unwrap();
    fs::write(dir.join("CONTEXT.md"), "context\n").unwrap();
}

#[test]
fn push_to_healthy_remote_exits_zero() {
    let tmp = TempDir::new().unwrap();
    content_sources(tmp.path());
    let share = tmp.path().join("share");

    riskgate(tmp.path())
        .args(["push", "--actor", "ci", "--health-url"])
        .arg(healthy_server())
        .arg("--copy-to")
        .arg(&share)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("2/2"));

    assert_eq!(fs::read_to_string(share.join("INDEX.md")).unwrap(), "# index\n");
    let records = read_audit(&tmp.path().join("risk_action_audit.jsonl")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].result, AuditResult::Success);
    assert_eq!(records[1].actor, "ci");
}

#[test]
fn push_reads_targets_from_environment() {
    let tmp = TempDir::new().unwrap();
    content_sources(tmp.path());
    let share = tmp.path().join("share");

    riskgate(tmp.path())
        .arg("push")
        .env("RISKGATE_HEALTH_URL", healthy_server())
        .env("RISKGATE_COPY_TO", &share)
        .assert()
        .code(0);
    assert!(share.join("CONTEXT.md").is_file());
}

#[test]
fn push_without_targets_exits_two() {
    let tmp = TempDir::new().unwrap();
    content_sources(tmp.path());

    riskgate(tmp.path())
        .arg("push")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("aborted"));

    let records = read_audit(&tmp.path().join("risk_action_audit.jsonl")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result, AuditResult::AbortedMissingTargetConfig);
}

#[test]
fn push_to_closed_port_is_blocked() {
    let tmp = TempDir::new().unwrap();
    content_sources(tmp.path());
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let share = tmp.path().join("share");

    riskgate(tmp.path())
        .args(["push", "--retries", "0", "--timeout", "1", "--health-url"])
        .arg(format!("http://127.0.0.1:{port}/health"))
        .arg("--copy-to")
        .arg(&share)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("blocked"));
    assert!(!share.exists());
}

#[test]
fn push_with_unwritable_destination_exits_one() {
    let tmp = TempDir::new().unwrap();
    content_sources(tmp.path());
    let share = tmp.path().join("share");
    // A non-empty directory where CONTEXT.md should land: its rename fails.
    fs::create_dir_all(share.join("CONTEXT.md").join("occupied")).unwrap();

    riskgate(tmp.path())
        .args(["push", "--health-url"])
        .arg(healthy_server())
        .arg("--copy-to")
        .arg(&share)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1/2").and(predicate::str::contains("CONTEXT.md (")));

    assert_eq!(fs::read_to_string(share.join("INDEX.md")).unwrap(), "# index\n");
    let records = read_audit(&tmp.path().join("risk_action_audit.jsonl")).unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.result, AuditResult::FailedVerify);
    let oks: Vec<_> = last.files.iter().map(|f| f.ok).collect();
    assert_eq!(oks, [true, false]);

    let log = fs::read_to_string(tmp.path().join("risk_action_audit.jsonl")).unwrap();
    assert!(log.lines().any(|line| line.contains(r#""result":"failed_verify""#)));
}

#[test]
fn dry_run_copies_nothing() {
    let tmp = TempDir::new().unwrap();
    content_sources(tmp.path());
    let share = tmp.path().join("share");

    riskgate(tmp.path())
        .args(["push", "--dry-run", "--health-url"])
        .arg(healthy_server())
        .arg("--copy-to")
        .arg(&share)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("[dry-run]"));
    assert!(!share.join("INDEX.md").exists());
}

#[test]
fn unknown_profile_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();
    riskgate(tmp.path())
        .args(["push", "--profile", "everything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("everything"));
    assert!(!tmp.path().join("risk_action_audit.jsonl").exists());
}

#[test]
fn json_output_carries_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.md"), "n").unwrap();
    let share = tmp.path().join("share");

    let output = riskgate(tmp.path())
        .args(["push", "--json", "--files", "notes.md", "--health-url"])
        .arg(healthy_server())
        .arg("--copy-to")
        .arg(&share)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["result"], "success");
    assert_eq!(value["files"][0]["file_name"], "notes.md");
    assert_eq!(value["files"][0]["ok"], true);
}
