//! Tests for bot process spawning and control.

use std::time::Duration;

use lucia_launcher::process::{BotCommand, ProcessHandle, SpawnError};

#[test]
fn command_without_requirements_has_nothing_missing() {
    let command = BotCommand::new("python").arg("main.py");
    assert!(command.missing_requirement().is_none());
}

#[tokio::test]
async fn spawn_missing_binary_is_not_found() {
    let result = ProcessHandle::spawn(&BotCommand::new("no-such-interpreter-9c2e"));
    assert!(matches!(result, Err(SpawnError::NotFound)));
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_captures_stdout() {
    use tokio::io::AsyncReadExt;

    let command = BotCommand::new("sh").args(["-c", "echo hello"]);
    let mut process = ProcessHandle::spawn(&command).unwrap();

    let mut stdout = process.take_stdout().unwrap();
    assert!(process.take_stdout().is_none());

    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    assert_eq!(output, "hello\n");

    assert!(process.wait().await.unwrap().success());
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_applies_working_dir_and_env() {
    use tokio::io::AsyncReadExt;

    let dir = tempfile::tempdir().unwrap();
    let command = BotCommand::new("sh")
        .args(["-c", "pwd; echo \"$LUCIA_TOKEN\""])
        .working_dir(dir.path())
        .env("LUCIA_TOKEN", "abc123");
    let mut process = ProcessHandle::spawn(&command).unwrap();

    let mut output = String::new();
    process
        .take_stdout()
        .unwrap()
        .read_to_string(&mut output)
        .await
        .unwrap();
    process.wait().await.unwrap();

    let mut lines = output.lines();
    let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    assert_eq!(lines.next(), Some("abc123"));
}

#[cfg(unix)]
#[tokio::test]
async fn arguments_are_not_shell_interpreted() {
    use tokio::io::AsyncReadExt;

    let command = BotCommand::new("echo").arg("$HOME; rm -rf /");
    let mut process = ProcessHandle::spawn(&command).unwrap();

    let mut output = String::new();
    process
        .take_stdout()
        .unwrap()
        .read_to_string(&mut output)
        .await
        .unwrap();
    process.wait().await.unwrap();

    assert_eq!(output, "$HOME; rm -rf /\n");
}

#[cfg(unix)]
#[tokio::test]
async fn kill_running_process() {
    let command = BotCommand::new("sh").args(["-c", "exec sleep 30"]);
    let mut process = ProcessHandle::spawn(&command).unwrap();

    assert!(process.try_wait().unwrap().is_none());
    process.start_kill().unwrap();

    let status = process.wait_timeout(Duration::from_secs(5)).await.unwrap();
    assert!(status.is_some());
    assert_eq!(process.info().exit_code, None);
    assert!(!process.info().running);
}
