//! Worktree Manager — C3.
//!
//! One detached git worktree per worker, grounded in the teacher's
//! `WorktreeBridge` subprocess style, generalized from branch-per-issue to a
//! detached (no-branch) checkout per worker.

use std::path::{Path, PathBuf};

use crate::command::{command_error, CommandRunner};
use crate::error::CoordResult;

#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    pub worker_id: String,
    pub path: PathBuf,
}

pub struct WorktreeManager {
    runner: CommandRunner,
    repo_path: PathBuf,
}

impl WorktreeManager {
    pub fn new(runner: CommandRunner, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            repo_path: repo_path.into(),
        }
    }

    pub async fn create(&self, worker_id: &str, path: &Path) -> CoordResult<WorktreeInfo> {
        let repo_path_str = self.repo_path.display().to_string();
        let path_str = path.display().to_string();
        let output = self
            .runner
            .run(
                &["git", "-C", &repo_path_str, "worktree", "add", &path_str, "-d"],
                &self.repo_path,
                None,
            )
            .await?;
        if !output.success() && !output.stderr.contains("already exists") {
            return Err(command_error(output));
        }
        Ok(WorktreeInfo {
            worker_id: worker_id.to_string(),
            path: path.to_path_buf(),
        })
    }

    pub async fn remove(&self, path: &Path) -> CoordResult<()> {
        let repo_path_str = self.repo_path.display().to_string();
        let path_str = path.display().to_string();
        self.runner
            .run(
                &["git", "-C", &repo_path_str, "worktree", "remove", "--force", &path_str],
                &self.repo_path,
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn diff(&self, path: &Path) -> CoordResult<String> {
        let output = self
            .runner
            .run(&["git", "-C", &path.display().to_string(), "diff", "HEAD"], path, None)
            .await?;
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            Command::new("git").args(&args).current_dir(dir).output().unwrap();
        }
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        Command::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
        Command::new("git").args(["commit", "-m", "init"]).current_dir(dir).output().unwrap();
    }

    #[tokio::test]
    async fn create_adds_detached_worktree() {
        let repo_dir = tempfile::tempdir().unwrap();
        init_repo(repo_dir.path());
        let wt_dir = tempfile::tempdir().unwrap();

        let manager = WorktreeManager::new(CommandRunner::new(), repo_dir.path());
        let wt_path = wt_dir.path().join("w1");
        let info = manager.create("w1", &wt_path).await.unwrap();
        assert!(info.path.exists());
    }
}
