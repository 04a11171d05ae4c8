use assert_cmd::Command;
use predicates::prelude::*;

fn summarize() -> Command {
    let mut cmd = Command::cargo_bin("summarize").unwrap();
    cmd.env("RUST_LOG", "off").env_remove("LOG_FORMAT");
    cmd
}

#[test]
fn version_flag_prints_version() {
    summarize()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_input_exits_with_failure() {
    summarize()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error (validation)"))
        .stderr(predicate::str::contains("exactly one input"));
}

#[test]
fn several_inputs_exit_with_failure() {
    summarize()
        .args(["--text", "hello", "--url", "https://example.com/watch?v=1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error (validation)"));
}

#[test]
fn blank_text_reports_no_content() {
    summarize()
        .args(["--text", "   "])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No text content was found or transcribed from 'direct text'. Nothing to summarize.",
        ));
}

#[test]
fn blank_text_as_json() {
    let output = summarize()
        .args(["--text", "\n\n", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["strategy"]["kind"], "no-content");
    assert_eq!(json["token_count"], 0);
    assert_eq!(json["source"], "direct text");
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    summarize()
        .env("DOWNLOAD_DIR", dir.path())
        .args(["--file"])
        .arg(dir.path().join("missing.txt"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error (file-not-found)"));
}

#[test]
fn non_http_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    summarize()
        .env("DOWNLOAD_DIR", dir.path())
        .args(["--url", "ftp://example.com/video.mp4"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error (validation)"));
}

#[test]
fn blank_text_file_is_saved_to_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.txt");
    let output = dir.path().join("summary.txt");
    std::fs::write(&input, "  \n").unwrap();

    summarize()
        .env("DOWNLOAD_DIR", dir.path())
        .arg("--file")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Summary saved to"));

    let saved = std::fs::read_to_string(&output).unwrap();
    assert!(saved.contains("local file: empty.txt"));
}

#[test]
fn show_config_prints_settings() {
    summarize()
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Current Configuration"))
        .stdout(predicate::str::contains("Chunk Target Tokens"));
}
