//! Preflight — C6.
//!
//! Verifies the binaries, repo path and agent CLI auth needed before a run
//! starts. Checks short-circuit: a missing binary or bad repo path skips the
//! (expensive) auth check.

use std::path::Path;

use crate::command::CommandRunner;
use crate::error::CoordResult;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PreflightCheck {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PreflightResult {
    pub checks: Vec<PreflightCheck>,
}

impl PreflightResult {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

fn has_command(command: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(command).is_file())
        })
        .unwrap_or(false)
}

async fn check_git_repo(runner: &CommandRunner, repo_path: &Path) -> CoordResult<PreflightCheck> {
    let repo_path_str = repo_path.display().to_string();
    let output = runner
        .run(
            &["git", "-C", &repo_path_str, "rev-parse", "--is-inside-work-tree"],
            repo_path,
            None,
        )
        .await?;
    let passed = output.success() && output.stdout.trim() == "true";
    let details = if !output.stdout.trim().is_empty() {
        output.stdout.trim().to_string()
    } else if !output.stderr.trim().is_empty() {
        output.stderr.trim().to_string()
    } else {
        "invalid git repository".to_string()
    };
    Ok(PreflightCheck {
        name: "repo_path".to_string(),
        passed,
        details,
    })
}

async fn check_agent_cli_auth(runner: &CommandRunner, repo_path: &Path) -> CoordResult<PreflightCheck> {
    let temp_file = tempfile::Builder::new()
        .prefix("bugorch-codex-auth-")
        .suffix(".txt")
        .tempfile()?;
    let repo_path_str = repo_path.display().to_string();
    let output_path = temp_file.path().display().to_string();
    let output = runner
        .run(
            &[
                "codex",
                "exec",
                "reply with OK",
                "-s",
                "read-only",
                "--skip-git-repo-check",
                "-C",
                &repo_path_str,
                "-o",
                &output_path,
            ],
            repo_path,
            Some(30),
        )
        .await?;

    let details = if !output.stderr.trim().is_empty() {
        output.stderr.trim().to_string()
    } else {
        output.stdout.trim().to_string()
    };

    if output.success() {
        return Ok(PreflightCheck {
            name: "codex_auth".to_string(),
            passed: true,
            details: "codex exec succeeded".to_string(),
        });
    }

    let lowered = details.to_lowercase();
    let login_needed = lowered.contains("login") || lowered.contains("auth");
    let reason = if details.is_empty() {
        "codex exec failed".to_string()
    } else if login_needed {
        format!("codex authentication required: {details}")
    } else {
        details
    };
    Ok(PreflightCheck {
        name: "codex_auth".to_string(),
        passed: false,
        details: reason,
    })
}

pub async fn run_preflight(runner: &CommandRunner, repo_path: &Path) -> CoordResult<PreflightResult> {
    let has_codex = has_command("codex");
    let has_tmux = has_command("tmux");
    let has_git = has_command("git");

    let mut checks = vec![
        PreflightCheck {
            name: "codex".to_string(),
            passed: has_codex,
            details: if has_codex { "codex found".to_string() } else { "codex not found in PATH".to_string() },
        },
        PreflightCheck {
            name: "tmux".to_string(),
            passed: has_tmux,
            details: if has_tmux { "tmux found".to_string() } else { "tmux not found in PATH".to_string() },
        },
        PreflightCheck {
            name: "git".to_string(),
            passed: has_git,
            details: if has_git { "git found".to_string() } else { "git not found in PATH".to_string() },
        },
    ];

    if repo_path.is_absolute() && repo_path.exists() {
        checks.push(PreflightCheck {
            name: "repo_exists".to_string(),
            passed: true,
            details: "repo path exists".to_string(),
        });
    } else {
        checks.push(PreflightCheck {
            name: "repo_exists".to_string(),
            passed: false,
            details: "repo path must be an absolute existing path".to_string(),
        });
        return Ok(PreflightResult { checks });
    }

    checks.push(check_git_repo(runner, repo_path).await?);

    if checks.iter().all(|c| c.passed) {
        checks.push(check_agent_cli_auth(runner, repo_path).await?);
    }

    Ok(PreflightResult { checks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_preflight_short_circuits_on_relative_repo_path() {
        let runner = CommandRunner::new();
        let result = run_preflight(&runner, Path::new("relative/path")).await.unwrap();
        assert!(!result.passed());
        assert!(result.checks.iter().any(|c| c.name == "repo_exists" && !c.passed));
        assert!(!result.checks.iter().any(|c| c.name == "codex_auth"));
    }

    #[tokio::test]
    async fn run_preflight_checks_real_git_repo() {
        let dir = tempfile::tempdir().unwrap();
        std::process::Command::new("git").arg("init").current_dir(dir.path()).output().unwrap();
        let runner = CommandRunner::new();
        let result = run_preflight(&runner, dir.path()).await.unwrap();
        assert!(result.checks.iter().any(|c| c.name == "repo_path" && c.passed));
    }
}
