//! Error types for issue normalization, reproduction and triage.

use thiserror::Error;

pub type CoordResult<T> = Result<T, CoordError>;

#[derive(Debug, Error)]
pub enum CoordError {
    #[error("command failed ({returncode}): {args:?}\ncwd={cwd}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    Command {
        args: Vec<String>,
        cwd: String,
        returncode: i32,
        stdout: String,
        stderr: String,
    },

    #[error("invalid GitHub issue URL: {0}")]
    InvalidIssueUrl(String),

    #[error("github API request failed ({status}): {body}")]
    GithubApi { status: u16, body: String },

    #[error("github API request failed: {0}")]
    GithubTransport(String),

    #[error("unable to locate JSON object in worker output")]
    JsonPayloadNotFound,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoordError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordError::GithubTransport(_) | CoordError::Io(_))
    }
}
