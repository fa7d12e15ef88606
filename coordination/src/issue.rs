//! Issue Normalizer — C5.
//!
//! Fetches a GitHub issue and extracts structured failure signals,
//! constraints and candidate target paths from its title/body text.

use once_cell_regex::{ASSERT_RE, CONSTRAINT_RE, EXCEPTION_RE, EXIT_CODE_RE, ISSUE_URL_RE, MESSAGE_RE, PATH_RE};
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::error::{CoordError, CoordResult};
use crate::types::{FailureSignal, IssueSpec};

mod once_cell_regex {
    use regex::Regex;
    use std::sync::OnceLock;

    macro_rules! lazy_regex {
        ($name:ident, $pattern:expr) => {
            pub fn $name() -> &'static Regex {
                static CELL: OnceLock<Regex> = OnceLock::new();
                CELL.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
            }
        };
    }

    lazy_regex!(
        issue_url_re,
        r"^https?://github\.com/([\w.-]+)/([\w.-]+)/issues/(\d+)(?:[/?#].*)?$"
    );
    lazy_regex!(
        exception_re,
        r"\b([A-Za-z_][A-Za-z0-9_]*(?:Error|Exception|Failure|AssertionError))\b"
    );
    lazy_regex!(assert_re, r"(?i)\b(assert(?:ion)?\s+failed|assert\b)\b");
    lazy_regex!(
        path_re,
        r"\b([A-Za-z0-9_./-]+\.(?:py|c|cc|cpp|h|hpp|js|ts|go|rs|java|rb|swift))\b"
    );
    lazy_regex!(
        message_re,
        r#"(?i)(?:message|error|exception)[:\s]+[`'"]([^`'"]{3,200})[`'"]"#
    );
    lazy_regex!(
        constraint_re,
        r"(?i)\b(must|cannot|can't|should|do not|don't|required|requirement)\b"
    );
    lazy_regex!(
        exit_code_re,
        r"(?i)(?:exit(?:\s+code)?|returns?)\s*[:=]?\s*(-?\d+)"
    );

    pub use assert_re as ASSERT_RE;
    pub use constraint_re as CONSTRAINT_RE;
    pub use exception_re as EXCEPTION_RE;
    pub use exit_code_re as EXIT_CODE_RE;
    pub use issue_url_re as ISSUE_URL_RE;
    pub use message_re as MESSAGE_RE;
    pub use path_re as PATH_RE;
}

pub fn parse_issue_url(issue_url: &str) -> CoordResult<(String, String, u64)> {
    let captures = ISSUE_URL_RE()
        .captures(issue_url.trim())
        .ok_or_else(|| CoordError::InvalidIssueUrl(issue_url.to_string()))?;
    let owner = captures[1].to_string();
    let repo = captures[2].to_string();
    let number: u64 = captures[3]
        .parse()
        .map_err(|_| CoordError::InvalidIssueUrl(issue_url.to_string()))?;
    Ok((owner, repo, number))
}

fn github_api_url(owner: &str, repo: &str, number: u64) -> String {
    format!("https://api.github.com/repos/{owner}/{repo}/issues/{number}")
}

#[derive(Debug, Deserialize)]
pub struct GithubLabel {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubIssuePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<GithubLabel>,
}

pub async fn fetch_issue_json(issue_url: &str) -> CoordResult<GithubIssuePayload> {
    let (owner, repo, number) = parse_issue_url(issue_url)?;
    let api_url = github_api_url(&owner, &repo, number);

    let mut request = reqwest::Client::new()
        .get(&api_url)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "bugorch-orchestrator");
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let response = request
        .timeout(std::time::Duration::from_secs(20))
        .send()
        .await
        .map_err(|err| CoordError::GithubTransport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CoordError::GithubApi {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<GithubIssuePayload>()
        .await
        .map_err(|err| CoordError::GithubTransport(err.to_string()))
}

pub fn extract_failure_signals(text: &str) -> Vec<FailureSignal> {
    let mut signals = Vec::new();
    let mut seen: BTreeSet<(Option<String>, Option<String>, Option<i64>, Option<String>)> = BTreeSet::new();

    let mut push = |signal: FailureSignal, seen: &mut BTreeSet<_>, signals: &mut Vec<FailureSignal>| {
        let key = (
            signal.exception_type.clone(),
            signal.message_substring.clone(),
            signal.exit_code,
            signal.raw_pattern.clone(),
        );
        if seen.insert(key) {
            signals.push(signal);
        }
    };

    for captures in EXCEPTION_RE().captures_iter(text) {
        let signal = FailureSignal {
            exception_type: Some(captures[1].to_string()),
            ..Default::default()
        };
        push(signal, &mut seen, &mut signals);
    }

    if ASSERT_RE().is_match(text) {
        let signal = FailureSignal {
            exception_type: Some("AssertionError".to_string()),
            raw_pattern: Some("assert".to_string()),
            ..Default::default()
        };
        push(signal, &mut seen, &mut signals);
    }

    for captures in MESSAGE_RE().captures_iter(text) {
        let signal = FailureSignal {
            message_substring: Some(captures[1].trim().to_string()),
            ..Default::default()
        };
        push(signal, &mut seen, &mut signals);
    }

    for captures in EXIT_CODE_RE().captures_iter(text) {
        if let Ok(code) = captures[1].parse::<i64>() {
            let signal = FailureSignal {
                exit_code: Some(code),
                ..Default::default()
            };
            push(signal, &mut seen, &mut signals);
        }
    }

    signals
}

pub fn normalize_issue_spec(issue_url: &str, payload: &GithubIssuePayload) -> CoordResult<IssueSpec> {
    let (owner, repo, number) = parse_issue_url(issue_url)?;
    let title = payload.title.clone().unwrap_or_default().trim().to_string();
    let body = payload.body.clone().unwrap_or_default().trim().to_string();
    let labels: Vec<String> = payload.labels.iter().map(|l| l.name.clone()).collect();
    let combined_text = format!("{title}\n\n{body}");

    let expected_failure_signals = extract_failure_signals(&combined_text);

    let constraints: BTreeSet<String> = body
        .lines()
        .map(str::trim)
        .filter(|line| CONSTRAINT_RE().is_match(line))
        .map(str::to_string)
        .collect();

    let target_paths: BTreeSet<String> = PATH_RE()
        .captures_iter(&combined_text)
        .map(|c| c[1].to_string())
        .collect();

    let mut status = "ok".to_string();
    let mut needs_human_reason = None;
    if expected_failure_signals.is_empty() {
        status = "needs-human".to_string();
        needs_human_reason = Some("no structured failure signal found in issue title/body".to_string());
    }

    Ok(IssueSpec {
        issue_url: issue_url.to_string(),
        repo_slug: format!("{owner}/{repo}"),
        issue_number: number,
        title,
        body,
        labels,
        expected_failure_signals,
        constraints: constraints.into_iter().collect(),
        target_paths: target_paths.into_iter().collect(),
        status,
        needs_human_reason,
    })
}

pub fn write_issue_spec(issue_spec: &IssueSpec, path: &std::path::Path) -> CoordResult<()> {
    crate::types::write_json_file(path, issue_spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_issue_url_extracts_owner_repo_number() {
        let (owner, repo, number) = parse_issue_url("https://github.com/numpy/numpy/issues/123").unwrap();
        assert_eq!(owner, "numpy");
        assert_eq!(repo, "numpy");
        assert_eq!(number, 123);
    }

    #[test]
    fn parse_issue_url_rejects_non_github() {
        assert!(parse_issue_url("https://gitlab.com/foo/bar/issues/1").is_err());
    }

    #[test]
    fn extract_failure_signals_dedupes_exception_types() {
        let text = "Raised ValueError twice: ValueError and another ValueError";
        let signals = extract_failure_signals(text);
        let value_errors = signals
            .iter()
            .filter(|s| s.exception_type.as_deref() == Some("ValueError"))
            .count();
        assert_eq!(value_errors, 1);
    }

    #[test]
    fn extract_failure_signals_detects_assertion_and_exit_code() {
        let text = "assert x == y\nexit code: 2";
        let signals = extract_failure_signals(text);
        assert!(signals.iter().any(|s| s.exception_type.as_deref() == Some("AssertionError")));
        assert!(signals.iter().any(|s| s.exit_code == Some(2)));
    }

    #[test]
    fn normalize_issue_spec_flags_needs_human_when_no_signal() {
        let payload = GithubIssuePayload {
            title: Some("something is odd".to_string()),
            body: Some("it just feels wrong".to_string()),
            labels: vec![],
        };
        let spec = normalize_issue_spec("https://github.com/a/b/issues/1", &payload).unwrap();
        assert_eq!(spec.status, "needs-human");
        assert!(spec.needs_human_reason.is_some());
    }

    #[test]
    fn normalize_issue_spec_collects_constraints_and_paths() {
        let payload = GithubIssuePayload {
            title: Some("ValueError on load".to_string()),
            body: Some(
                "The loader must validate shapes.\nSee numpy/core/fromnumeric.py for details.".to_string(),
            ),
            labels: vec![],
        };
        let spec = normalize_issue_spec("https://github.com/a/b/issues/1", &payload).unwrap();
        assert_eq!(spec.status, "ok");
        assert!(spec.constraints.iter().any(|c| c.contains("must validate")));
        assert!(spec.target_paths.contains(&"numpy/core/fromnumeric.py".to_string()));
    }
}
