//! Smoke tests for the `lantern` binary.
//!
//! Drives the binary over stdio without a real host on the other side.

use std::io::Write;
use std::process::{Command, Stdio};

fn lantern() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lantern"))
}

fn tree_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"root":"card","elements":{{"card":{{"key":"card","type":"Card","props":{{"title":"Quarterly numbers"}}}}}}}}"#
    )
    .unwrap();
    file
}

#[test]
fn binary_responds_to_help() {
    let output = lantern().arg("--help").output().expect("failed to execute lantern");
    assert!(output.status.success(), "lantern --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--payload"));
    assert!(stdout.contains("--standalone"));
    assert!(stdout.contains("--origin"));
}

#[test]
fn unknown_flag_exits_nonzero() {
    let output = lantern()
        .arg("--no-such-flag")
        .output()
        .expect("failed to execute lantern");
    assert!(!output.status.success(), "unknown flag should exit non-zero");
}

#[test]
fn standalone_renders_payload_and_exits_on_eof() {
    let payload = tree_file();
    let dir = tempfile::tempdir().unwrap();

    let output = lantern()
        .arg("--standalone")
        .arg("--payload")
        .arg(payload.path())
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute lantern");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#""op":"show_loading""#), "stdout: {stdout}");
    assert!(stdout.contains(r#""op":"mount""#), "stdout: {stdout}");
    assert!(stdout.contains("Quarterly numbers"));
    assert!(!stdout.contains("ui/initialize"), "standalone must not handshake");
}

#[test]
fn embedded_sends_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = lantern()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn lantern");

    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "not json").unwrap();
        writeln!(
            stdin,
            r#"{{"kind":"message","origin":"stdio","data":{{"jsonrpc":"2.0","id":"p1","method":"ping"}}}}"#
        )
        .unwrap();
    }

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let initialize = stdout.lines().find(|l| l.contains("ui/initialize")).unwrap();
    let first: serde_json::Value = serde_json::from_str(initialize).unwrap();
    assert_eq!(first["kind"], "message");
    assert_eq!(first["target_origin"], "stdio");
    assert!(stdout.contains(r#""id":"p1""#), "ping should be acknowledged: {stdout}");
}

#[test]
fn missing_payload_file_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let output = lantern()
        .arg("--payload")
        .arg(dir.path().join("absent.json"))
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute lantern");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("payload"), "stderr: {stderr}");
}
