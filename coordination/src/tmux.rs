//! Session Supervisor — C2.
//!
//! A thin adapter over `tmux` for creating, inspecting and tearing down the
//! detached sessions that host worker agent CLIs.

use std::path::{Path, PathBuf};

use crate::command::CommandRunner;
use crate::error::CoordResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub exists: bool,
}

pub struct SessionSupervisor {
    runner: CommandRunner,
    cwd: PathBuf,
}

impl SessionSupervisor {
    pub fn new(runner: CommandRunner, cwd: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            cwd: cwd.into(),
        }
    }

    pub async fn list_sessions(&self, prefix: Option<&str>) -> CoordResult<Vec<String>> {
        let output = self
            .runner
            .run(&["tmux", "ls", "-F", "#{session_name}"], &self.cwd, None)
            .await?;
        if !output.success() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(match prefix {
            None => names,
            Some(prefix) => names.into_iter().filter(|n| n.starts_with(prefix)).collect(),
        })
    }

    pub async fn session_exists(&self, name: &str) -> CoordResult<bool> {
        Ok(self.list_sessions(None).await?.iter().any(|n| n == name))
    }

    pub async fn create_session(
        &self,
        name: &str,
        workdir: &Path,
        command: Option<&str>,
    ) -> CoordResult<()> {
        let workdir_str = workdir.display().to_string();
        let mut args = vec!["tmux", "new-session", "-d", "-s", name, "-c", &workdir_str];
        if let Some(command) = command {
            args.push(command);
        }
        let output = self.runner.run(&args, &self.cwd, None).await?;
        if !output.success() {
            return Err(crate::command::command_error(output));
        }
        Ok(())
    }

    pub async fn kill_session(&self, name: &str) -> CoordResult<()> {
        self.runner
            .run(&["tmux", "kill-session", "-t", name], &self.cwd, None)
            .await?;
        Ok(())
    }

    pub async fn send_text(&self, name: &str, text: &str, press_enter: bool) -> CoordResult<()> {
        let mut args = vec!["tmux".to_string(), "send-keys".to_string(), "-t".to_string(), name.to_string(), text.to_string()];
        if press_enter {
            args.push("C-m".to_string());
        }
        let output = self.runner.run(&args, &self.cwd, None).await?;
        if !output.success() {
            return Err(crate::command::command_error(output));
        }
        Ok(())
    }

    pub async fn capture_pane(&self, name: &str, lines: u32) -> CoordResult<String> {
        let scrollback = format!("-{lines}");
        let output = self
            .runner
            .run(
                &["tmux", "capture-pane", "-p", "-t", name, "-S", &scrollback],
                &self.cwd,
                None,
            )
            .await?;
        if !output.success() {
            return Ok(String::new());
        }
        Ok(output.stdout)
    }

    pub fn attach_command(name: &str) -> String {
        format!("tmux attach -t {}", shell_quote(name))
    }
}

fn shell_quote(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.') {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_command_quotes_only_when_needed() {
        assert_eq!(
            SessionSupervisor::attach_command("bugorch-run-w1"),
            "tmux attach -t bugorch-run-w1"
        );
        assert_eq!(
            SessionSupervisor::attach_command("has space"),
            "tmux attach -t 'has space'"
        );
    }
}
