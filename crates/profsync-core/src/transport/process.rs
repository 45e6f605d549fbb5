//! Subprocess helpers

use crate::error::{SyncError, SyncResult};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Run a program and return its output whatever the exit status
///
/// # Errors
/// Returns a transport error if the program cannot be spawned
pub async fn output(program: &str, args: &[&str], cwd: Option<&Path>) -> SyncResult<Output> {
    debug!(program, ?args, "spawn");

    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    command
        .output()
        .await
        .map_err(|e| SyncError::transport(program, format!("can not run {program}: {e}")))
}

/// Run a program and return its trimmed stdout
///
/// # Errors
/// Returns a transport error if the program cannot be spawned or exits
/// with a non-zero status
pub async fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> SyncResult<String> {
    let output = output(program, args, cwd).await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    } else {
        Err(SyncError::transport(program, failure_message(args, &output)))
    }
}

/// Run a command line through the platform shell
///
/// # Errors
/// Returns a transport error if the shell cannot be spawned or the command fails
pub async fn run_shell(command_line: &str, cwd: Option<&Path>) -> SyncResult<String> {
    if cfg!(windows) {
        run("cmd", &["/C", command_line], cwd).await
    } else {
        run("sh", &["-c", command_line], cwd).await
    }
}

fn failure_message(args: &[&str], output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    format!("`{}` exited with {code}: {}", args.join(" "), stderr.trim())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_shell_captures_stdout() {
        assert_eq!(run_shell("echo hello", None).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_failure_is_a_transport_error() {
        let err = run_shell("echo boom >&2; exit 3", None).await.unwrap_err();
        assert_eq!(err.code(), "TRANSPORT_ERROR");
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        assert!(run("profsync-no-such-program", &[], None).await.is_err());
    }
}
