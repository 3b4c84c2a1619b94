//! CLI tests for `dataentry check` and `dataentry run`.
//!
//! Spawns the binary and verifies exit codes for clean and rejected tables,
//! malformed mappings, and an unreachable WebDriver endpoint.

use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};

use dataentry::exit_codes;

const MAPPING: &str = "\
url: https://forms.example.test/signup
submit_selector: '#submit'
fields:
  email:
    selector: '#email'
    required: true
    validators:
      - {type: regex, pattern: '[^@]+@[^@]+', message: 'Invalid email'}
  country:
    selector: '#country'
    type: select
    validators:
      - {type: enum, values: [US, CA]}
";

fn write_inputs(dir: &Path, rows: &str) {
    fs::write(dir.join("form.yaml"), MAPPING).expect("write mapping");
    fs::write(dir.join("rows.csv"), rows).expect("write rows");
}

fn dataentry(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dataentry"))
        .current_dir(dir)
        .env_remove("DATAENTRY_WEBDRIVER_URL")
        .args(args)
        .output()
        .expect("spawn dataentry")
}

#[test]
fn check_clean_table_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_inputs(temp.path(), "email,country\na@b.com,US\nc@d.com,CA\n");

    let output = dataentry(
        temp.path(),
        &["check", "--input", "rows.csv", "--map", "form.yaml"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Checked: 2, Valid: 2, Rejected: 0"), "{stdout}");
}

#[test]
fn check_rejected_rows_exit_with_rejected_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_inputs(temp.path(), "email,country\na@b.com,US\n,CA\nx@y.com,MX\n");

    let output = dataentry(
        temp.path(),
        &["check", "--input", "rows.csv", "--map", "form.yaml"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::ROWS_REJECTED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("row 2: Missing required field: email"), "{stdout}");
    assert!(stdout.contains("row 3: country must be one of [US, CA]"), "{stdout}");
}

#[test]
fn malformed_mapping_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_inputs(temp.path(), "email,country\na@b.com,US\n");
    fs::write(
        temp.path().join("form.yaml"),
        "url: u\nfields:\n  email: {selector: '#email', type: radio}\n",
    )
    .expect("overwrite mapping");

    let output = dataentry(
        temp.path(),
        &["check", "--input", "rows.csv", "--map", "form.yaml"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported field type 'radio'"), "{stderr}");
}

#[test]
fn malformed_filter_exits_invalid_before_any_row() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_inputs(temp.path(), "email,country\na@b.com,US\n");

    let output = dataentry(
        temp.path(),
        &[
            "run",
            "--input",
            "rows.csv",
            "--map",
            "form.yaml",
            "--filter",
            "country ==",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(!temp.path().join("results.csv").exists());
}

#[test]
fn unreachable_webdriver_exits_with_launch_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_inputs(temp.path(), "email,country\na@b.com,US\n");
    // Bind then release a port so nothing is listening on it.
    let port = TcpListener::bind("127.0.0.1:0")
        .expect("bind")
        .local_addr()
        .expect("addr")
        .port();
    let url = format!("http://127.0.0.1:{port}");

    let output = dataentry(
        temp.path(),
        &[
            "run",
            "--input",
            "rows.csv",
            "--map",
            "form.yaml",
            "--webdriver-url",
            &url,
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::BROWSER_LAUNCH));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to start chrome automation session"),
        "{stderr}"
    );
}
