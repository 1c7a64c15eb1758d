#![cfg(test)] // workaround for https://github.com/rust-lang/rust-clippy/issues/11024

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use wait_timeout::ChildExt;

const TEST_TIMEOUT: Duration = Duration::from_secs(60);

fn instance_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("instances")
        .join(name)
}

/// Run the scheduler on `input`, writing to `output`, and wait for it to exit.
fn run_scheduler<'a>(
    input: &Path,
    output: &Path,
    args: impl IntoIterator<Item = &'a str>,
) -> ExitStatus {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pumpkin-jobshop"));

    for arg in args {
        let _ = command.arg(arg);
    }

    let mut child = command
        .arg(input)
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .expect("Failed to run scheduler.");

    match child.wait_timeout(TEST_TIMEOUT) {
        Ok(None) => {
            let _ = child.kill();
            panic!("scheduler took more than {} seconds", TEST_TIMEOUT.as_secs())
        }
        Ok(Some(status)) => status,
        Err(e) => panic!("error starting scheduler: {e}"),
    }
}

#[test]
fn writes_the_schedule_to_the_output_file() {
    let directory = TempDir::new().expect("temporary directory");
    let output = directory.path().join("chain.out");

    let status = run_scheduler(
        &instance_path("chain.txt"),
        &output,
        ["-g", "2", "-t", "10"],
    );

    assert!(status.success());
    let contents = std::fs::read_to_string(&output).expect("output was written");
    assert_eq!(contents, "0 1\n3 1\n");
}

#[test]
fn checked_schedules_are_written() {
    let directory = TempDir::new().expect("temporary directory");
    let output = directory.path().join("mixed.out");

    let status = run_scheduler(
        &instance_path("mixed.txt"),
        &output,
        ["--group_size", "2", "--time_out", "10", "--check", "-v"],
    );

    assert!(status.success());
    let contents = std::fs::read_to_string(&output).expect("output was written");
    assert_eq!(contents.lines().count(), 7);
}

#[test]
fn infeasible_instances_fail_without_output() {
    let directory = TempDir::new().expect("temporary directory");
    let output = directory.path().join("infeasible.out");

    let status = run_scheduler(&instance_path("infeasible.txt"), &output, std::iter::empty());

    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn malformed_instances_fail_without_output() {
    let directory = TempDir::new().expect("temporary directory");
    let input = directory.path().join("truncated.txt");
    std::fs::write(&input, "2\n3\n1\n").expect("writing the instance succeeds");
    let output = directory.path().join("truncated.out");

    let status = run_scheduler(&input, &output, std::iter::empty());

    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn an_invalid_time_out_is_rejected() {
    let directory = TempDir::new().expect("temporary directory");
    let output = directory.path().join("chain.out");

    let status = run_scheduler(&instance_path("chain.txt"), &output, ["-t", "-1"]);

    assert!(!status.success());
    assert!(!output.exists());
}
