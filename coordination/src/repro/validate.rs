//! Reproducer validation and scoring.

use std::path::Path;

use crate::command::CommandRunner;
use crate::error::CoordResult;
use crate::types::{FailureSignal, IssueSpec, ReproCandidate, ValidationResult};

fn signature_matches(output: &str, claimed_signature: &str, expected_signals: &[FailureSignal]) -> bool {
    let lowered = output.to_lowercase();
    if !claimed_signature.is_empty() && lowered.contains(&claimed_signature.to_lowercase()) {
        return true;
    }
    for signal in expected_signals {
        if let Some(exception_type) = &signal.exception_type {
            if lowered.contains(&exception_type.to_lowercase()) {
                return true;
            }
        }
        if let Some(message) = &signal.message_substring {
            if lowered.contains(&message.to_lowercase()) {
                return true;
            }
        }
    }
    false
}

fn render_python_command(command: &str, python_executable: Option<&str>) -> String {
    let Some(python_executable) = python_executable else {
        return command.to_string();
    };
    let quoted = shell_quote(python_executable);
    let rendered = command.replace("{python}", &quoted);
    replace_bare_python_token(&rendered, &quoted)
}

fn replace_bare_python_token(text: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < text.len() {
        if text[i..].starts_with("python") {
            let before_ok = i == 0 || !is_token_char(bytes[i - 1] as char);
            let after_idx = i + "python".len();
            let after_ok = after_idx >= text.len() || !is_token_char(bytes[after_idx] as char);
            if before_ok && after_ok {
                out.push_str(replacement);
                i = after_idx;
                continue;
            }
        }
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '/' || c == '.' || c == '-'
}

fn shell_quote(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/') {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

pub struct ValidateParams<'a> {
    pub runs: u32,
    pub min_matches: u32,
    pub python_executable: Option<&'a str>,
    pub timeout_sec: u64,
}

impl Default for ValidateParams<'_> {
    fn default() -> Self {
        Self {
            runs: 5,
            min_matches: 3,
            python_executable: None,
            timeout_sec: 30,
        }
    }
}

/// Write the candidate's script, run its setup commands once, then run the
/// oracle command `runs` times, counting how many outputs match the claimed
/// failure signature.
pub async fn validate_candidate(
    candidate: &ReproCandidate,
    issue_spec: &IssueSpec,
    repo_path: &Path,
    candidate_script_path: &Path,
    command_runner: &CommandRunner,
    params: ValidateParams<'_>,
) -> CoordResult<ValidationResult> {
    std::fs::write(candidate_script_path, &candidate.script)?;

    for setup_cmd in &candidate.setup_commands {
        let rendered = setup_cmd.replace("{repro_file}", &candidate_script_path.display().to_string());
        let rendered = render_python_command(&rendered, params.python_executable);
        let result = command_runner
            .run_shell(&rendered, repo_path, Some(params.timeout_sec))
            .await?;
        if !result.success() {
            return Ok(ValidationResult {
                total_runs: params.runs,
                matches: 0,
                passed: false,
            });
        }
    }

    let mut matches = 0u32;
    for _ in 0..params.runs {
        let oracle_cmd = candidate
            .oracle_command
            .replace("{repro_file}", &candidate_script_path.display().to_string());
        let oracle_cmd = render_python_command(&oracle_cmd, params.python_executable);
        let result = command_runner
            .run_shell(&oracle_cmd, repo_path, Some(params.timeout_sec))
            .await?;
        let output = format!("{}\n{}", result.stdout, result.stderr);
        if signature_matches(&output, &candidate.claimed_failure_signature, &issue_spec.expected_failure_signals) {
            matches += 1;
        }
    }

    let required_matches = params.min_matches.clamp(1, params.runs);
    let passed = matches >= required_matches;
    Ok(ValidationResult {
        total_runs: params.runs,
        matches,
        passed,
    })
}

pub fn score_candidate(candidate: &ReproCandidate, issue_spec: &IssueSpec) -> f64 {
    let Some(validation) = &candidate.validation else {
        return 0.0;
    };

    let determinism = validation.matches as f64 / validation.total_runs.max(1) as f64;

    let expected_terms: Vec<String> = issue_spec
        .expected_failure_signals
        .iter()
        .flat_map(|signal| {
            [&signal.exception_type, &signal.message_substring]
                .into_iter()
                .flatten()
                .map(|s| s.to_lowercase())
        })
        .collect();

    let lower_claim = candidate.claimed_failure_signature.to_lowercase();
    let fidelity = if expected_terms.iter().any(|term| lower_claim.contains(term)) {
        1.0
    } else {
        0.0
    };

    let line_count = candidate.script.lines().count().max(1);
    let size_score = (1.0 - (line_count.min(200) as f64 / 200.0)).max(0.0);

    round5(0.6 * determinism + 0.25 * fidelity + 0.15 * size_score)
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

pub fn choose_best_candidate(candidates: &[ReproCandidate], issue_spec: &IssueSpec) -> Option<ReproCandidate> {
    let mut scored: Vec<ReproCandidate> = candidates
        .iter()
        .map(|c| {
            let score = score_candidate(c, issue_spec);
            let mut c = c.clone();
            c.score = Some(score);
            c
        })
        .collect();

    scored.retain(|c| c.validation.as_ref().is_some_and(|v| v.passed));
    if scored.is_empty() {
        return None;
    }

    scored.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap()
            .then_with(|| a.script.lines().count().cmp(&b.script.lines().count()))
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });

    scored.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_spec() -> IssueSpec {
        IssueSpec {
            issue_url: "https://github.com/a/b/issues/1".to_string(),
            repo_slug: "a/b".to_string(),
            issue_number: 1,
            title: "t".to_string(),
            body: "b".to_string(),
            expected_failure_signals: vec![FailureSignal {
                exception_type: Some("ValueError".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn candidate(script: &str, validation: Option<ValidationResult>) -> ReproCandidate {
        ReproCandidate {
            candidate_id: "w1-candidate".to_string(),
            worker_id: "w1".to_string(),
            script: script.to_string(),
            setup_commands: vec![],
            oracle_command: "python {repro_file}".to_string(),
            claimed_failure_signature: "ValueError".to_string(),
            file_extension: "py".to_string(),
            validation,
            score: None,
        }
    }

    #[test]
    fn score_candidate_zero_without_validation() {
        let c = candidate("print(1)\n", None);
        assert_eq!(score_candidate(&c, &issue_spec()), 0.0);
    }

    #[test]
    fn score_candidate_rewards_determinism_and_fidelity() {
        let c = candidate(
            "print(1)\n",
            Some(ValidationResult {
                total_runs: 5,
                matches: 5,
                passed: true,
            }),
        );
        let score = score_candidate(&c, &issue_spec());
        assert!(score > 0.9);
    }

    #[test]
    fn choose_best_candidate_prefers_higher_score_then_shorter_script() {
        let mut long_script = String::new();
        for i in 0..50 {
            long_script.push_str(&format!("x{i} = {i}\n"));
        }
        let a = candidate(
            &long_script,
            Some(ValidationResult {
                total_runs: 5,
                matches: 5,
                passed: true,
            }),
        );
        let mut b = candidate(
            "print(1)\n",
            Some(ValidationResult {
                total_runs: 5,
                matches: 5,
                passed: true,
            }),
        );
        b.candidate_id = "w2-candidate".to_string();

        let spec = issue_spec();
        let best = choose_best_candidate(&[a, b], &spec).unwrap();
        assert_eq!(best.candidate_id, "w2-candidate");
    }

    #[test]
    fn choose_best_candidate_excludes_failed_validation() {
        let c = candidate(
            "print(1)\n",
            Some(ValidationResult {
                total_runs: 5,
                matches: 1,
                passed: false,
            }),
        );
        assert!(choose_best_candidate(&[c], &issue_spec()).is_none());
    }
}
