//! Subprocess execution — C1.
//!
//! Wraps `tokio::process::Command`. Neither `run` nor `run_shell` raises on a
//! non-zero exit; callers inspect `CommandOutput::returncode`. A timeout is
//! reported as a failed run, not propagated as an error.

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{CoordError, CoordResult};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub args: Vec<String>,
    pub cwd: String,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(
        &self,
        args: &[impl AsRef<str>],
        cwd: &Path,
        timeout_sec: Option<u64>,
    ) -> CoordResult<CommandOutput> {
        let arg_list: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let Some((program, rest)) = arg_list.split_first() else {
            return Ok(CommandOutput {
                args: arg_list,
                cwd: cwd.display().to_string(),
                returncode: -1,
                stdout: String::new(),
                stderr: "no command given".to_string(),
            });
        };
        let mut command = Command::new(program);
        command.args(rest).current_dir(cwd);
        self.run_command(command, arg_list, cwd, timeout_sec).await
    }

    pub async fn run_shell(
        &self,
        shell_command: &str,
        cwd: &Path,
        timeout_sec: Option<u64>,
    ) -> CoordResult<CommandOutput> {
        let args = vec!["sh".to_string(), "-lc".to_string(), shell_command.to_string()];
        let mut command = Command::new("sh");
        command.args(["-lc", shell_command]).current_dir(cwd);
        self.run_command(command, args, cwd, timeout_sec).await
    }

    async fn run_command(
        &self,
        mut command: Command,
        args: Vec<String>,
        cwd: &Path,
        timeout_sec: Option<u64>,
    ) -> CoordResult<CommandOutput> {
        let future = command.output();
        let output = match timeout_sec {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), future).await {
                Ok(result) => result?,
                Err(_) => {
                    return Ok(CommandOutput {
                        args,
                        cwd: cwd.display().to_string(),
                        returncode: 124,
                        stdout: String::new(),
                        stderr: format!("command timed out after {secs}s"),
                    })
                }
            },
            None => future.await?,
        };

        Ok(CommandOutput {
            args,
            cwd: cwd.display().to_string(),
            returncode: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Convert a failed [`CommandOutput`] into a [`CoordError::Command`].
pub fn command_error(output: CommandOutput) -> CoordError {
    CoordError::Command {
        args: output.args,
        cwd: output.cwd,
        returncode: output.returncode,
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let runner = CommandRunner::new();
        let cwd = std::env::current_dir().unwrap();
        let output = runner.run(&["echo", "hi"], &cwd, None).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn run_shell_reports_nonzero_exit_without_erroring() {
        let runner = CommandRunner::new();
        let cwd = std::env::current_dir().unwrap();
        let output = runner.run_shell("exit 3", &cwd, None).await.unwrap();
        assert_eq!(output.returncode, 3);
    }

    #[tokio::test]
    async fn run_shell_times_out_instead_of_hanging() {
        let runner = CommandRunner::new();
        let cwd = std::env::current_dir().unwrap();
        let output = runner.run_shell("sleep 5", &cwd, Some(1)).await.unwrap();
        assert_eq!(output.returncode, 124);
    }
}
